use std::{fs, path::Path, time::Duration};

use serde::Deserialize;
use tracing::warn;
use url::Url;

use crate::error::{ClientError, Result};

pub const SETTINGS_FILE: &str = "lostfound.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub backend_url: String,
    pub request_timeout_secs: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:8000".into(),
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    backend_url: Option<String>,
    request_timeout_secs: Option<u64>,
}

impl ClientSettings {
    /// Parses and normalizes the backend base URL (no trailing slash).
    pub fn base_url(&self) -> Result<Url> {
        let trimmed = self.backend_url.trim().trim_end_matches('/');
        let url = Url::parse(trimmed)
            .map_err(|err| ClientError::Config(format!("backend url '{trimmed}': {err}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ClientError::Config(format!(
                "backend url '{trimmed}' must use http or https"
            )));
        }
        if url.cannot_be_a_base() {
            return Err(ClientError::Config(format!(
                "backend url '{trimmed}' cannot be used as a base"
            )));
        }
        Ok(url)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

pub fn load_settings() -> ClientSettings {
    load_settings_from(Path::new(SETTINGS_FILE), |key| std::env::var(key).ok())
}

/// Defaults, then the TOML file at `path` (if readable), then environment.
pub fn load_settings_from(path: &Path, env: impl Fn(&str) -> Option<String>) -> ClientSettings {
    let mut settings = ClientSettings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        match toml::from_str::<FileSettings>(&raw) {
            Ok(file_cfg) => {
                if let Some(v) = file_cfg.backend_url {
                    settings.backend_url = v;
                }
                if let Some(v) = file_cfg.request_timeout_secs {
                    settings.request_timeout_secs = v;
                }
            }
            Err(err) => {
                warn!(path = %path.display(), %err, "ignoring unparsable settings file");
            }
        }
    }

    if let Some(v) = env("LOSTFOUND_BACKEND_URL") {
        settings.backend_url = v;
    }
    if let Some(v) = env("APP__BACKEND_URL") {
        settings.backend_url = v;
    }

    if let Some(v) = env("APP__REQUEST_TIMEOUT_SECS") {
        match v.parse::<u64>() {
            Ok(parsed) => settings.request_timeout_secs = parsed,
            Err(_) => warn!(value = %v, "ignoring invalid APP__REQUEST_TIMEOUT_SECS"),
        }
    }

    settings
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
