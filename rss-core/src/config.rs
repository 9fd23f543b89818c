use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::api::{DEFAULT_API_BASE_URL, DEFAULT_API_TIMEOUT};
use crate::poller::DEFAULT_POLLING_INTERVAL_MS;
use crate::preview::DEFAULT_DEBOUNCE;
use crate::transform::{DEFAULT_MAX_TITLE_LENGTH, DEFAULT_SUMMARY_LENGTH};

pub const APP_DIR_NAME: &str = "rss-reader";
pub const CONFIG_FILE: &str = "config.json";
pub const API_BASE_URL_ENV: &str = "RSS_API_BASE_URL";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub feeds: FeedConfig,
    pub polling: PollingSettings,
    pub preview: PreviewConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FeedConfig {
    pub max_summary_length: usize,
    pub max_title_length: usize,
    pub max_subscriptions: usize,
}

/// Default interval for a fresh install; the persisted polling config wins.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PollingSettings {
    pub interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PreviewConfig {
    pub debounce_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_owned(),
            request_timeout_seconds: DEFAULT_API_TIMEOUT.as_secs(),
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            max_summary_length: DEFAULT_SUMMARY_LENGTH,
            max_title_length: DEFAULT_MAX_TITLE_LENGTH,
            max_subscriptions: 100,
        }
    }
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_POLLING_INTERVAL_MS,
        }
    }
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE.as_millis() as u64,
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl PreviewConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl AppConfig {
    /// Dossier de données de l'application (`<config>/rss-reader`)
    pub fn config_dir() -> PathBuf {
        let mut dir = dirs::config_dir()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));
        dir.push(APP_DIR_NAME);
        dir
    }

    /// Charge la configuration du dossier par défaut
    pub fn load() -> Self {
        Self::load_from(Self::config_dir().join(CONFIG_FILE))
    }

    /// Charge la configuration depuis le fichier, ou les valeurs par défaut
    pub fn load_from(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let mut config = match Self::load_from_file(path) {
            Ok(config) => config,
            Err(e) => {
                if path.exists() {
                    warn!(error = %e, path = %path.display(), "failed to load config, using defaults");
                }
                Self::default()
            }
        };
        config.apply_env();
        config
    }

    fn load_from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn apply_env(&mut self) {
        if let Ok(base_url) = std::env::var(API_BASE_URL_ENV) {
            if !base_url.trim().is_empty() {
                self.api.base_url = base_url.trim().to_owned();
            }
        }
    }

    /// Sauvegarde la configuration dans le fichier
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
