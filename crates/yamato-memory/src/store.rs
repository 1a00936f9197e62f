//! JSON-document-backed persistent store.
//!
//! The whole database is one JSON file with `users`, `profiles` and `economy`
//! collections. Every mutation re-reads the file, applies the change and writes
//! it back atomically (temp file + rename), so manual edits made while the bot
//! runs are not clobbered.

mod users;

#[cfg(test)]
mod tests;

pub use users::{Registration, UserRecord};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};
use yamato_core::{error::YamatoError, shellexpand};

/// On-disk document layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct Database {
    #[serde(default)]
    pub users: Vec<UserRecord>,
    /// Owned by profile commands; carried through untouched.
    #[serde(default)]
    pub profiles: Map<String, Value>,
    /// Owned by economy commands; carried through untouched.
    #[serde(default)]
    pub economy: Map<String, Value>,
    /// Unknown top-level keys survive a rewrite.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Persistent store backed by a JSON file.
pub struct Store {
    path: PathBuf,
    data: Mutex<Database>,
}

impl Store {
    /// Open (or create) the store at `path`.
    pub async fn open(path: &str) -> Result<Self, YamatoError> {
        let path = PathBuf::from(shellexpand(path));
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| YamatoError::Store(format!("failed to create data dir: {e}")))?;
        }

        let data = read_document(&path).await?;
        let store = Self {
            path,
            data: Mutex::new(data),
        };
        store.flush().await?;

        info!("store initialized at {}", store.path.display());
        Ok(store)
    }

    /// Write the in-memory document to disk.
    pub async fn flush(&self) -> Result<(), YamatoError> {
        let data = self.data.lock().await;
        write_document(&self.path, &data).await
    }

    /// Read-modify-write under the store lock.
    pub(crate) async fn update<T>(
        &self,
        f: impl FnOnce(&mut Database) -> T,
    ) -> Result<T, YamatoError> {
        let mut data = self.data.lock().await;
        *data = read_document(&self.path).await?;
        let out = f(&mut data);
        write_document(&self.path, &data).await?;
        Ok(out)
    }

    /// Read from the cached document.
    pub(crate) async fn view<T>(&self, f: impl FnOnce(&Database) -> T) -> T {
        let data = self.data.lock().await;
        f(&data)
    }
}

async fn read_document(path: &Path) -> Result<Database, YamatoError> {
    match tokio::fs::read_to_string(path).await {
        Ok(raw) if raw.trim().is_empty() => Ok(Database::default()),
        Ok(raw) => serde_json::from_str(&raw).map_err(|e| {
            YamatoError::Store(format!("corrupt database {}: {e}", path.display()))
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("no database at {}, starting empty", path.display());
            Ok(Database::default())
        }
        Err(e) => Err(YamatoError::Store(format!(
            "failed to read {}: {e}",
            path.display()
        ))),
    }
}

async fn write_document(path: &Path, data: &Database) -> Result<(), YamatoError> {
    let json = serde_json::to_string_pretty(data)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json)
        .await
        .map_err(|e| YamatoError::Store(format!("failed to write {}: {e}", tmp.display())))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| YamatoError::Store(format!("failed to replace {}: {e}", path.display())))
}
