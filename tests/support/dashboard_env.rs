use std::{
    path::PathBuf,
    sync::{Mutex, OnceLock},
};

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

const CONFIG_HOME: &str = "DELAY_DASHBOARD_CONFIG_HOME";
const API_URL: &str = "DELAY_DASHBOARD_API_URL";

/// Points the dashboard's env overrides somewhere safe for one test and
/// restores them on drop.
pub struct DashboardEnvGuard {
    previous: Vec<(&'static str, Option<String>)>,
    _lock: std::sync::MutexGuard<'static, ()>,
}

impl DashboardEnvGuard {
    pub fn new(config_home: PathBuf, api_url: Option<&str>) -> Self {
        let lock = ENV_LOCK
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|err| err.into_inner());
        let previous = vec![
            (CONFIG_HOME, std::env::var(CONFIG_HOME).ok()),
            (API_URL, std::env::var(API_URL).ok()),
        ];
        // SAFETY: tests run under a global lock to prevent concurrent env mutations.
        unsafe {
            std::env::set_var(CONFIG_HOME, config_home);
            match api_url {
                Some(url) => std::env::set_var(API_URL, url),
                None => std::env::remove_var(API_URL),
            }
        }
        Self {
            previous,
            _lock: lock,
        }
    }
}

impl Drop for DashboardEnvGuard {
    fn drop(&mut self) {
        for (name, value) in self.previous.drain(..) {
            // SAFETY: tests run under a global lock to prevent concurrent env mutations.
            unsafe {
                match value {
                    Some(value) => std::env::set_var(name, value),
                    None => std::env::remove_var(name),
                }
            }
        }
    }
}
