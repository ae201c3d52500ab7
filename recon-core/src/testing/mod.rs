//! Test doubles for driving the engine without a server.

pub mod fixtures;
mod stub;

pub use stub::{StubFailure, StubScanApi};
