//! Plugin Configuration Store - persisted enabled flag and config blob per plugin.
//!
//! The store is a single JSON file holding an array of entries:
//!
//! ```json
//! [{ "id": "status", "enabled": true, "config": { "greeting": "hi" } }]
//! ```
//!
//! A plugin without an entry is treated as `{ enabled: true, config: {} }`,
//! so first-time plugins start enabled. A missing or malformed file reads as
//! an empty table rather than an error; a corrupted file must never keep the
//! host from starting.
//!
//! Every operation runs under one async lock, and writes replace the file
//! atomically (write to a sibling temp file, then rename).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Arbitrary per-plugin configuration object
pub type ConfigMap = Map<String, Value>;

/// Persisted state for one plugin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub id: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub config: ConfigMap,
}

fn default_enabled() -> bool {
    true
}

impl ConfigEntry {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            enabled: default_enabled(),
            config: ConfigMap::new(),
        }
    }
}

/// Errors that can occur while persisting plugin state
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Plugin store I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize plugin store: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// File-backed table of [`ConfigEntry`] keyed by plugin id
pub struct ConfigStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All persisted entries, in file order
    pub async fn list_all(&self) -> Result<Vec<ConfigEntry>, StoreError> {
        let _guard = self.lock.lock().await;
        self.read_entries().await
    }

    pub async fn get(&self, id: &str) -> Result<Option<ConfigEntry>, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(self.read_entries().await?.into_iter().find(|e| e.id == id))
    }

    /// Whether the plugin should be enabled. Defaults to `true` when absent.
    pub async fn is_enabled(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.get(id).await?.map(|e| e.enabled).unwrap_or(true))
    }

    pub async fn set_enabled(&self, id: &str, enabled: bool) -> Result<(), StoreError> {
        self.update(id, |entry| entry.enabled = enabled).await?;
        debug!(plugin = %id, enabled, "Persisted plugin enabled flag");
        Ok(())
    }

    /// Persisted config object. Defaults to `{}` when absent.
    pub async fn get_config_data(&self, id: &str) -> Result<ConfigMap, StoreError> {
        Ok(self.get(id).await?.map(|e| e.config).unwrap_or_default())
    }

    /// Shallow-merge `partial` into the persisted config and return the result.
    ///
    /// Keys in `partial` are added or overwritten; keys it omits are kept.
    pub async fn set_config_data(
        &self,
        id: &str,
        partial: ConfigMap,
    ) -> Result<ConfigMap, StoreError> {
        let keys = partial.len();
        let entry = self
            .update(id, move |entry| entry.config.extend(partial))
            .await?;
        debug!(plugin = %id, keys, "Persisted plugin config");
        Ok(entry.config)
    }

    /// Read-modify-write of a single entry, creating it with defaults if needed
    async fn update<F>(&self, id: &str, mutate: F) -> Result<ConfigEntry, StoreError>
    where
        F: FnOnce(&mut ConfigEntry),
    {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_entries().await?;

        let index = match entries.iter().position(|e| e.id == id) {
            Some(index) => index,
            None => {
                entries.push(ConfigEntry::new(id));
                entries.len() - 1
            }
        };
        mutate(&mut entries[index]);
        let updated = entries[index].clone();

        self.write_entries(&entries).await?;
        Ok(updated)
    }

    /// Read the whole table. Missing or malformed files read as empty.
    async fn read_entries(&self) -> Result<Vec<ConfigEntry>, StoreError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                warn!(path = ?self.path, error = %e, "Plugin store is not valid UTF-8, starting fresh");
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        match serde_json::from_str::<Vec<ConfigEntry>>(&content) {
            Ok(entries) => Ok(dedup_entries(entries)),
            Err(e) => {
                warn!(path = ?self.path, error = %e, "Failed to parse plugin store, starting fresh");
                Ok(Vec::new())
            }
        }
    }

    /// Replace the table on disk atomically
    async fn write_entries(&self, entries: &[ConfigEntry]) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await.map_err(io_err)?;
            }
        }

        let json = serde_json::to_string_pretty(entries)?;
        let tmp = temp_path(&self.path);
        fs::write(&tmp, json).await.map_err(io_err)?;
        if let Err(e) = fs::rename(&tmp, &self.path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(io_err(e));
        }

        debug!(path = ?self.path, count = entries.len(), "Saved plugin store");
        Ok(())
    }
}

/// Keep the first entry per id; a hand-edited file may carry duplicates
fn dedup_entries(entries: Vec<ConfigEntry>) -> Vec<ConfigEntry> {
    let mut seen = std::collections::HashSet::new();
    entries
        .into_iter()
        .filter(|e| {
            let first = seen.insert(e.id.clone());
            if !first {
                warn!(plugin = %e.id, "Duplicate plugin store entry ignored");
            }
            first
        })
        .collect()
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "plugins.json".into());
    name.push(".tmp");
    path.with_file_name(name)
}
