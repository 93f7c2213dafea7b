//! Simple config loader using TOML and serde.
//! The struct is intentionally small and typed; every field has a default so
//! the server can boot without a config file.

use serde::Deserialize;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Bind address for the HTTP API (e.g., "127.0.0.1:8080").
    pub bind_addr: Option<String>,

    /// Directory holding the LMDB environment.
    pub data_dir: Option<String>,

    /// Base URL of the external vision classifier. Unset → verification
    /// endpoints answer 503.
    pub vision_api_url: Option<String>,

    /// Optional bearer token for the classifier.
    pub vision_api_token: Option<String>,

    /// Timeout for classifier calls, in milliseconds.
    pub vision_timeout_ms: Option<u64>,

    /// Shared token required on admin endpoints (X-Admin-Token header).
    /// Unset → admin surface answers 403 for every caller.
    pub admin_token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind_addr: Some("127.0.0.1:8080".to_string()),
            data_dir: Some("./data".to_string()),
            vision_api_url: None,
            vision_api_token: None,
            vision_timeout_ms: Some(15_000),
            admin_token: None,
        }
    }
}

impl Config {
    /// Apply environment overrides on top of the loaded values.
    ///
    /// Variables read: `COINTASK_BIND_ADDR`, `COINTASK_DATA_DIR`,
    /// `COINTASK_VISION_URL`, `COINTASK_VISION_TOKEN`,
    /// `COINTASK_VISION_TIMEOUT_MS`, `COINTASK_ADMIN_TOKEN`.
    pub fn apply_env(mut self) -> Self {
        if let Ok(v) = std::env::var("COINTASK_BIND_ADDR") {
            self.bind_addr = Some(v);
        }
        if let Ok(v) = std::env::var("COINTASK_DATA_DIR") {
            self.data_dir = Some(v);
        }
        if let Ok(v) = std::env::var("COINTASK_VISION_URL") {
            self.vision_api_url = Some(v);
        }
        if let Ok(v) = std::env::var("COINTASK_VISION_TOKEN") {
            self.vision_api_token = Some(v);
        }
        if let Ok(v) = std::env::var("COINTASK_VISION_TIMEOUT_MS") {
            if let Ok(ms) = v.parse::<u64>() {
                self.vision_timeout_ms = Some(ms);
            }
        }
        if let Ok(v) = std::env::var("COINTASK_ADMIN_TOKEN") {
            self.admin_token = Some(v);
        }
        self
    }
}

/// Load config from a TOML file path.
/// If the file is missing or fails to parse, an error is returned.
pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let s = fs::read_to_string(path.as_ref())?;
    let cfg: Config = toml::from_str(&s)?;
    Ok(cfg)
}
