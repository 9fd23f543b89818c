use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::feed::Subscription;
use crate::poller::PollingConfig;

pub const SUBSCRIPTIONS_FILE: &str = "subscriptions.json";
pub const POLLING_CONFIG_FILE: &str = "polling_config.json";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct StorageData {
    #[serde(default)]
    subscriptions: Vec<Subscription>,
}

/// Best-effort JSON persistence in a single directory.
///
/// Reads never fail: missing or corrupt files yield empty/default values.
/// Writes go through a `.json.tmp` sibling and a rename; failures are logged
/// and swallowed.
#[derive(Debug, Clone)]
pub struct LocalStore {
    dir: Option<PathBuf>,
}

impl LocalStore {
    pub fn in_memory() -> Self {
        Self { dir: None }
    }

    pub async fn open(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref().to_path_buf();
        if let Err(e) = tokio::fs::create_dir_all(&dir).await {
            warn!(error = %e, path = %dir.display(), "failed to create data dir");
        }
        Self { dir: Some(dir) }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    fn path_for(&self, file: &str) -> Option<PathBuf> {
        self.dir.as_ref().map(|dir| dir.join(file))
    }

    pub async fn load_subscriptions(&self) -> Vec<Subscription> {
        let Some(path) = self.path_for(SUBSCRIPTIONS_FILE) else {
            return Vec::new();
        };
        read_json_with_tmp_fallback::<StorageData>(&path)
            .await
            .subscriptions
    }

    pub async fn save_subscriptions(&self, subscriptions: &[Subscription]) {
        let data = StorageData {
            subscriptions: subscriptions.to_vec(),
        };
        self.persist(SUBSCRIPTIONS_FILE, &data).await;
    }

    pub async fn load_polling_config(&self) -> PollingConfig {
        self.stored_polling_config().await.unwrap_or_default()
    }

    /// `None` when nothing usable has been persisted yet.
    pub async fn stored_polling_config(&self) -> Option<PollingConfig> {
        let path = self.path_for(POLLING_CONFIG_FILE)?;
        read_json_with_tmp_fallback::<Option<serde_json::Value>>(&path)
            .await
            .map(|value| PollingConfig::from_value(&value))
    }

    pub async fn save_polling_config(&self, config: &PollingConfig) {
        self.persist(POLLING_CONFIG_FILE, config).await;
    }

    async fn persist<T: Serialize>(&self, file: &str, value: &T) {
        let Some(path) = self.path_for(file) else {
            debug!(file, "store is in-memory only; skipping persist");
            return;
        };
        match serde_json::to_vec_pretty(value) {
            Ok(bytes) => {
                if let Some(parent) = path.parent() {
                    let _ = tokio::fs::create_dir_all(parent).await;
                }
                // Ecriture atomique
                let tmp = path.with_extension("json.tmp");
                if let Err(e) = tokio::fs::write(&tmp, &bytes).await {
                    warn!(error = %e, path = %tmp.display(), "failed to write temp file");
                    return;
                }
                if let Err(e) = tokio::fs::rename(&tmp, &path).await {
                    warn!(error = %e, path = %path.display(), "failed to persist file");
                }
            }
            Err(e) => warn!(error = %e, file, "failed to serialize for persistence"),
        }
    }
}

async fn read_json_with_tmp_fallback<T: DeserializeOwned + Default>(path: &Path) -> T {
    match tokio::fs::read(path).await {
        Ok(bytes) => match serde_json::from_slice::<T>(&bytes) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, path = %path.display(), "failed to parse JSON, trying tmp fallback");
                let tmp = path.with_extension("json.tmp");
                match tokio::fs::read(&tmp).await {
                    Ok(tmp_bytes) => serde_json::from_slice::<T>(&tmp_bytes).unwrap_or_default(),
                    Err(_) => Default::default(),
                }
            }
        },
        Err(_) => Default::default(),
    }
}
