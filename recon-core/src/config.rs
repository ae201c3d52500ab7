use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use recon_model::LeakScanMode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub const CONFIG_PATH_ENV: &str = "RECON_CONFIG_PATH";
pub const CONFIG_JSON_ENV: &str = "RECON_CONFIG_JSON";
pub const SERVER_URL_ENV: &str = "RECON_SERVER_URL";

const DEFAULT_CANDIDATES: &[&str] = &[
    "recon.toml",
    "recon.json",
    "config/recon.toml",
    "config/recon.json",
];

/// Source that produced the dashboard configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConfigSource {
    #[default]
    Default,
    EnvPath(PathBuf),
    EnvInline,
    File(PathBuf),
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => f.write_str("built-in defaults"),
            ConfigSource::EnvPath(path) => {
                write!(f, "{} (via ${CONFIG_PATH_ENV})", path.display())
            }
            ConfigSource::EnvInline => write!(f, "${CONFIG_JSON_ENV}"),
            ConfigSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read configuration {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration {origin}: {message}")]
    Parse { origin: String, message: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Client settings. Every field has a default, so a partial file is fine.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Scan API origin. `/api/v1` is appended by the client.
    pub server_url: String,
    /// Jobs per listing page.
    pub page_size: u32,
    /// Listing refresh cadence while no job is open.
    pub auto_refresh_ms: u64,
    /// Per-job progress poll cadence.
    pub progress_poll_ms: u64,
    /// Overall request timeout. Unset leaves the HTTP client default.
    pub request_timeout_ms: Option<u64>,
    /// Pause between a manual subdomain add and the detail refresh.
    pub augment_refresh_delay_ms: u64,
    pub leak_scan: LeakScanConfig,
}

/// Selective leak scan monitoring.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LeakScanConfig {
    pub poll_interval_ms: u64,
    /// Ticks after which the scan is declared done regardless of findings.
    pub max_ticks: u32,
    /// Ticks before a non-zero leak count may end the scan early.
    pub min_ticks: u32,
    /// Ceiling for the synthetic percentage before completion.
    pub progress_cap_percent: u8,
    pub default_mode: LeakScanMode,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8000".to_string(),
            page_size: 100,
            auto_refresh_ms: 10_000,
            progress_poll_ms: 2_000,
            request_timeout_ms: None,
            augment_refresh_delay_ms: 2_000,
            leak_scan: LeakScanConfig::default(),
        }
    }
}

impl Default for LeakScanConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2_000,
            max_ticks: 2_800,
            min_ticks: 10,
            progress_cap_percent: 95,
            default_mode: LeakScanMode::Tiny,
        }
    }
}

impl DashboardConfig {
    /// Load configuration using environment variables.
    /// Evaluation order:
    /// 1) `$RECON_CONFIG_PATH` (TOML or JSON file),
    /// 2) `$RECON_CONFIG_JSON` (inline JSON),
    /// 3) the first of `recon.toml`, `recon.json`, `config/recon.toml`,
    ///    `config/recon.json` that exists,
    /// 4) defaults.
    ///
    /// `$RECON_SERVER_URL` then overrides `server_url`.
    pub fn load_from_env() -> Result<(Self, ConfigSource), ConfigLoadError> {
        Self::load_with(|key| env::var(key).ok(), Path::new("."))
    }

    /// [`load_from_env`](Self::load_from_env) with an injected variable
    /// lookup and search root.
    pub fn load_with<F>(
        lookup: F,
        root: &Path,
    ) -> Result<(Self, ConfigSource), ConfigLoadError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty =
            |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let (mut config, source) = if let Some(path) =
            non_empty(CONFIG_PATH_ENV)
        {
            let path = PathBuf::from(path);
            (Self::load_from_file(&path)?, ConfigSource::EnvPath(path))
        } else if let Some(raw) = non_empty(CONFIG_JSON_ENV) {
            (Self::parse_json(&raw, CONFIG_JSON_ENV)?, ConfigSource::EnvInline)
        } else if let Some(path) = Self::find_default_file(root) {
            (Self::load_from_file(&path)?, ConfigSource::File(path))
        } else {
            (Self::default(), ConfigSource::Default)
        };

        if let Some(url) = non_empty(SERVER_URL_ENV) {
            debug!(server_url = %url, "server URL overridden from environment");
            config.server_url = url.trim().to_string();
        }

        config.validate()?;
        Ok((config, source))
    }

    pub fn load_from_file(path: &Path) -> Result<Self, ConfigLoadError> {
        let contents =
            fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let origin = path.display().to_string();

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::parse_json(&contents, &origin),
            Some("toml") | Some("tml") => toml::from_str(&contents).map_err(
                |err| ConfigLoadError::Parse {
                    origin,
                    message: err.to_string(),
                },
            ),
            _ => Self::parse_from_str(&contents, &origin),
        }
    }

    /// Try TOML first, then JSON.
    pub fn parse_from_str(
        contents: &str,
        origin: &str,
    ) -> Result<Self, ConfigLoadError> {
        toml::from_str(contents).or_else(|toml_err| {
            serde_json::from_str(contents).map_err(|json_err| {
                ConfigLoadError::Parse {
                    origin: origin.to_string(),
                    message: format!(
                        "toml error: {toml_err}; json error: {json_err}"
                    ),
                }
            })
        })
    }

    pub fn parse_json(
        raw: &str,
        origin: &str,
    ) -> Result<Self, ConfigLoadError> {
        serde_json::from_str(raw).map_err(|err| ConfigLoadError::Parse {
            origin: origin.to_string(),
            message: err.to_string(),
        })
    }

    fn find_default_file(root: &Path) -> Option<PathBuf> {
        DEFAULT_CANDIDATES
            .iter()
            .map(|candidate| root.join(candidate))
            .find(|path| path.is_file())
    }

    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        let invalid =
            |msg: &str| Err(ConfigLoadError::Invalid(msg.to_string()));

        if self.server_url.trim().is_empty() {
            return invalid("server_url must not be empty");
        }
        if self.page_size == 0 {
            return invalid("page_size must be at least 1");
        }
        if self.auto_refresh_ms == 0
            || self.progress_poll_ms == 0
            || self.leak_scan.poll_interval_ms == 0
        {
            return invalid("poll and refresh intervals must be non-zero");
        }
        if self.request_timeout_ms == Some(0) {
            return invalid("request_timeout_ms must be non-zero when set");
        }
        if self.leak_scan.max_ticks == 0 {
            return invalid("leak_scan.max_ticks must be at least 1");
        }
        if self.leak_scan.min_ticks > self.leak_scan.max_ticks {
            return invalid("leak_scan.min_ticks must not exceed max_ticks");
        }
        if !(1..=100).contains(&self.leak_scan.progress_cap_percent) {
            return invalid(
                "leak_scan.progress_cap_percent must be within 1..=100",
            );
        }
        Ok(())
    }

    pub fn auto_refresh_interval(&self) -> Duration {
        Duration::from_millis(self.auto_refresh_ms)
    }

    pub fn progress_poll_interval(&self) -> Duration {
        Duration::from_millis(self.progress_poll_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    pub fn augment_refresh_delay(&self) -> Duration {
        Duration::from_millis(self.augment_refresh_delay_ms)
    }
}

impl LeakScanConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
