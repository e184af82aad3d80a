//! Dashboard settings loaded from `config.toml` in the app root.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::app_dirs;
use crate::training::TestSplitRatio;
use crate::upload::DEFAULT_MAX_UPLOAD_BYTES;

/// Default filename used to store the dashboard configuration.
pub const CONFIG_FILE_NAME: &str = "config.toml";
/// Environment variable that replaces `api_base_url`.
pub const API_URL_ENV: &str = "DELAY_DASHBOARD_API_URL";
/// Service address used when nothing else is configured.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

/// Errors raised while locating, reading or validating the config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No suitable config directory available")]
    NoConfigDir,
    #[error("Failed to create config directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config file {path}: {source}")]
    ParseToml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Invalid service URL `{value}`: {reason}")]
    InvalidBaseUrl { value: String, reason: String },
    #[error("Invalid default_test_split {0}: must be 0.10 to 0.50 in steps of 0.05")]
    InvalidTestSplit(f64),
    #[error("max_upload_bytes must be greater than zero")]
    InvalidUploadLimit,
    #[error("logging.retained_files must be at least 1")]
    InvalidLogRetention,
}

/// Timeouts applied to every request made by the service client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpTimeouts {
    pub connect_timeout_secs: u64,
    /// Training can take minutes on large files.
    pub read_timeout_secs: u64,
    pub write_timeout_secs: u64,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            read_timeout_secs: 300,
            write_timeout_secs: 120,
        }
    }
}

impl HttpTimeouts {
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn write(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }
}

/// The `[logging]` table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` takes precedence.
    pub filter: String,
    /// Also write each run to a file under the app's `logs/` directory.
    pub to_file: bool,
    /// Run files kept, including the current one.
    pub retained_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info,ureq=warn".to_string(),
            to_file: true,
            retained_files: 10,
        }
    }
}

/// All dashboard settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub api_base_url: String,
    pub max_upload_bytes: u64,
    pub default_test_split: f64,
    pub http: HttpTimeouts,
    pub logging: LoggingConfig,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            default_test_split: TestSplitRatio::default().value(),
            http: HttpTimeouts::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl DashboardConfig {
    /// Parsed service base URL.
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        parse_base_url(&self.api_base_url)
    }

    /// Configured default split, validated against the slider grid.
    pub fn test_split(&self) -> Result<TestSplitRatio, ConfigError> {
        TestSplitRatio::new(self.default_test_split)
            .map_err(|_| ConfigError::InvalidTestSplit(self.default_test_split))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.base_url()?;
        self.test_split()?;
        if self.max_upload_bytes == 0 {
            return Err(ConfigError::InvalidUploadLimit);
        }
        if self.logging.retained_files == 0 {
            return Err(ConfigError::InvalidLogRetention);
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var(API_URL_ENV)
            && !value.trim().is_empty()
        {
            tracing::info!("Using service URL from {API_URL_ENV}: {value}");
            self.api_base_url = value.trim().to_string();
        }
    }
}

/// Resolve the configuration file path, ensuring the parent directory exists.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    let dir = app_dirs::app_root_dir().map_err(map_app_dir_error)?;
    Ok(dir.join(CONFIG_FILE_NAME))
}

/// Load configuration from the app root, returning defaults if the file is
/// missing. Environment overrides are applied before validation.
pub fn load_or_default() -> Result<DashboardConfig, ConfigError> {
    let path = config_path()?;
    let mut config = load_from(&path)?;
    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}

/// Load configuration from a specific path without environment overrides.
pub fn load_from(path: &Path) -> Result<DashboardConfig, ConfigError> {
    if !path.exists() {
        return Ok(DashboardConfig::default());
    }
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config: DashboardConfig = toml::from_str(&text).map_err(|source| ConfigError::ParseToml {
        path: path.to_path_buf(),
        source,
    })?;
    config.validate()?;
    Ok(config)
}

fn parse_base_url(value: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidBaseUrl {
        value: value.to_string(),
        reason,
    };
    let url = Url::parse(value.trim()).map_err(|err| invalid(err.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme `{}`", url.scheme())));
    }
    if url.cannot_be_a_base() || url.host_str().is_none() {
        return Err(invalid("missing host".to_string()));
    }
    Ok(url)
}

fn map_app_dir_error(error: app_dirs::AppDirError) -> ConfigError {
    match error {
        app_dirs::AppDirError::NoBaseDir => ConfigError::NoConfigDir,
        app_dirs::AppDirError::CreateDir { path, source } => {
            ConfigError::CreateDir { path, source }
        }
    }
}
