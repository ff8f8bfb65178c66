//! Layered client settings: config file, then environment, then explicit overrides.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::OlsError;

pub const BASE_URL_ENV: &str = "OLS_BASE_URL";
pub const EMBEDDED_FIELD_ENV: &str = "OLS_EMBEDDED_FIELD";
pub const DEPLOYMENT_ENV: &str = "OLS_DEPLOYMENT";

/// User-facing options that shape how a client is built.
///
/// Every field is optional; unset fields fall back to the deployment's defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Named deployment (`ebi`, `tib`, `zbmed`, `monarch`, `fraunhofer`).
    pub deployment: Option<String>,
    /// Overrides the deployment root URL.
    pub base_url: Option<String>,
    /// Overrides the embedded field holding term items.
    pub embedded_field: Option<String>,
    /// Overrides where cached responses are stored.
    pub cache_dir: Option<PathBuf>,
    pub page_size: Option<usize>,
}

pub(crate) fn env_value(var: &str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

impl Settings {
    /// Loads the config file (if any) and applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error when the config file exists but cannot be read or parsed.
    pub fn load() -> Result<Self, OlsError> {
        let from_file = Self::from_file(&crate::utils::paths::config_path())?;
        Ok(from_file.unwrap_or_default().with_env_from(env_value))
    }

    /// Reads settings from a JSON file; a missing file is `Ok(None)`.
    pub fn from_file(path: &Path) -> Result<Option<Self>, OlsError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let settings: Self = serde_json::from_str(&raw).map_err(|err| {
            OlsError::InvalidArgument(format!("Invalid config file {}: {err}", path.display()))
        })?;
        Ok(Some(settings))
    }

    /// Applies environment overrides using `lookup` to read variables.
    pub fn with_env_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(DEPLOYMENT_ENV) {
            self.deployment = Some(value);
        }
        if let Some(value) = lookup(BASE_URL_ENV) {
            self.base_url = Some(value);
        }
        if let Some(value) = lookup(EMBEDDED_FIELD_ENV) {
            self.embedded_field = Some(value);
        }
        if let Some(value) = lookup(crate::utils::paths::CACHE_DIR_ENV) {
            self.cache_dir = Some(PathBuf::from(value));
        }
        self
    }

    /// Layers `overrides` on top of `self`; set fields in `overrides` win.
    pub fn merge(self, overrides: Settings) -> Self {
        Self {
            deployment: overrides.deployment.or(self.deployment),
            base_url: overrides.base_url.or(self.base_url),
            embedded_field: overrides.embedded_field.or(self.embedded_field),
            cache_dir: overrides.cache_dir.or(self.cache_dir),
            page_size: overrides.page_size.or(self.page_size),
        }
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(crate::utils::paths::ols_cache_dir)
    }
}
