use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const COMMENTS_URL_ENV: &str = "REVIEW_PORTAL_COMMENTS_URL";
const SUBMIT_URL_ENV: &str = "REVIEW_PORTAL_SUBMIT_URL";

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Portal settings from `config.toml`. Every key is optional.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PortalConfig {
    /// Comment workflow trigger URL, or a path to a local JSON file.
    pub comments_url: Option<String>,
    /// Endpoint receiving the submission payload.
    pub submit_url: Option<String>,
    /// Directory holding `<documentId>.html` agreement files.
    pub agreements_dir: PathBuf,
    pub access_phrase: Option<String>,
    /// Prefilled reviewer name.
    pub reviewer_name: String,
    pub log_file: PathBuf,
    pub highlight_coalesce_ms: u64,
    pub request_timeout_secs: u64,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            comments_url: None,
            submit_url: None,
            agreements_dir: PathBuf::from("agreements"),
            access_phrase: None,
            reviewer_name: String::new(),
            log_file: PathBuf::from("review-portal.log"),
            highlight_coalesce_ms: 300,
            request_timeout_secs: 30,
        }
    }
}

impl PortalConfig {
    /// Load the config from an explicit path, or from the default location.
    ///
    /// A missing default file yields defaults; a missing explicit file is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let (path, required) = match explicit {
            Some(p) => (p.to_path_buf(), true),
            None => (default_config_path(), false),
        };

        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(source) => return Err(ConfigError::Read { path, source }),
        };

        toml::from_str(&raw).map_err(|source| ConfigError::Parse { path, source })
    }

    /// Apply environment overrides for the two endpoints.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(COMMENTS_URL_ENV).filter(|v| !v.is_empty()) {
            self.comments_url = Some(url);
        }
        if let Some(url) = lookup(SUBMIT_URL_ENV).filter(|v| !v.is_empty()) {
            self.submit_url = Some(url);
        }
    }

    pub fn coalesce_window(&self) -> Duration {
        Duration::from_millis(self.highlight_coalesce_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

/// Returns the path to the default config file.
///
/// Prefers `$XDG_CONFIG_HOME/review-portal/config.toml`; falls back to
/// `~/.config/review-portal/config.toml`.
pub fn default_config_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .ok()
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join(".config"))
        })
        .unwrap_or_else(|| PathBuf::from(".config"));
    base.join("review-portal").join("config.toml")
}
