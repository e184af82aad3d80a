//! Where the dashboard keeps `config.toml` and its run logs.
//!
//! Everything lives in one `.delay-dashboard` folder under the OS config root.
//! `DELAY_DASHBOARD_CONFIG_HOME` replaces that root, e.g. for portable setups.

use std::path::PathBuf;

use directories::BaseDirs;
use thiserror::Error;

/// Folder created under the config root.
pub const APP_DIR_NAME: &str = ".delay-dashboard";
/// Environment variable that replaces the OS config root.
pub const CONFIG_HOME_ENV: &str = "DELAY_DASHBOARD_CONFIG_HOME";
const LOGS_DIR_NAME: &str = "logs";

#[derive(Debug, Error)]
pub enum AppDirError {
    #[error("No config root found; set {CONFIG_HOME_ENV} to choose one")]
    NoBaseDir,
    #[error("Failed to create {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// The `.delay-dashboard` folder, created on first use.
pub fn app_root_dir() -> Result<PathBuf, AppDirError> {
    ensure_dir(config_root()?.join(APP_DIR_NAME))
}

/// `logs/` inside the app folder, created on first use.
pub fn logs_dir() -> Result<PathBuf, AppDirError> {
    ensure_dir(app_root_dir()?.join(LOGS_DIR_NAME))
}

fn ensure_dir(path: PathBuf) -> Result<PathBuf, AppDirError> {
    match std::fs::create_dir_all(&path) {
        Ok(()) => Ok(path),
        Err(source) => Err(AppDirError::CreateDir { path, source }),
    }
}

/// Test override, then the env variable, then the platform config dir.
fn config_root() -> Result<PathBuf, AppDirError> {
    let from_env = || {
        std::env::var_os(CONFIG_HOME_ENV)
            .map(PathBuf::from)
            .filter(|path| !path.as_os_str().is_empty())
    };
    override_root()
        .or_else(from_env)
        .or_else(|| BaseDirs::new().map(|dirs| dirs.config_dir().to_path_buf()))
        .ok_or(AppDirError::NoBaseDir)
}

#[cfg(test)]
fn override_root() -> Option<PathBuf> {
    test_root::current()
}

#[cfg(not(test))]
fn override_root() -> Option<PathBuf> {
    None
}

#[cfg(test)]
pub(crate) use test_root::OverrideGuard;
