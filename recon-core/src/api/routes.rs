macro_rules! v1_path {
    ($path:literal) => {
        concat!("/api/v1", $path)
    };
}

/// Versioned scan API routes.
pub mod v1 {
    pub const ROOT: &str = "/api/v1";

    pub mod scans {
        pub const COLLECTION: &str = v1_path!("/scans");
        pub const BULK: &str = v1_path!("/scans/bulk");
        pub const ITEM: &str = v1_path!("/scans/{id}");
        pub const PROGRESS: &str = v1_path!("/scans/{id}/progress");
        pub const STOP: &str = v1_path!("/scans/{id}/stop");
        pub const FORCE: &str = v1_path!("/scans/{id}/force");
        pub const LEAK_SCAN: &str = v1_path!("/scans/{id}/leak-scan");
        pub const SUBDOMAINS: &str = v1_path!("/scans/{id}/subdomains");
    }
}

pub mod utils {
    /// Substitute `{id}` with the percent-encoded job id.
    pub fn with_id(route: &str, id: impl AsRef<str>) -> String {
        route.replace("{id}", &urlencoding::encode(id.as_ref()))
    }

    /// Append query parameters to the provided route.
    pub fn with_query(route: &str, params: &[(&str, String)]) -> String {
        if params.is_empty() {
            return route.to_string();
        }

        let query = params
            .iter()
            .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&");
        format!("{route}?{query}")
    }
}
