use std::path::{Path, PathBuf};

const APP_DIR: &str = "ols-client";
pub(crate) const CACHE_DIR_ENV: &str = "OLS_CACHE_DIR";

/// Default location for cached HTTP responses.
///
/// `OLS_CACHE_DIR` wins over the platform cache directory.
pub fn ols_cache_dir() -> PathBuf {
    if let Some(dir) = crate::config::env_value(CACHE_DIR_ENV) {
        return PathBuf::from(dir);
    }
    match dirs::cache_dir() {
        Some(dir) => dir.join(APP_DIR),
        None => std::env::temp_dir().join(APP_DIR),
    }
}

pub fn ols_config_dir() -> PathBuf {
    match dirs::config_dir() {
        Some(dir) => dir.join(APP_DIR),
        None => std::env::temp_dir().join(APP_DIR),
    }
}

pub fn config_path() -> PathBuf {
    ols_config_dir().join("config.json")
}

pub(crate) fn http_cache_dir(root: &Path) -> PathBuf {
    root.join("http-cacache")
}
