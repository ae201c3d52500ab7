//! HTTP access to the scanning API.

pub mod client;
pub mod error;
pub mod routes;
pub mod service;

pub use client::ApiClient;
pub use error::ApiError;
pub use service::ScanApi;
