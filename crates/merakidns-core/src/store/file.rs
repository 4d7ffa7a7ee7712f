// # File Resource Store
//
// File-based implementation of ResourceStore with crash recovery.
//
// ## Purpose
//
// Keeps sources, their status and the generated endpoints across daemon
// restarts, so a restart inside the throttle window does not hit the
// inventory API again.
//
// ## Crash Recovery
//
// - Atomic writes: Uses write-then-rename for atomicity
// - Corruption detection: Validates JSON on load
// - Automatic backup: Keeps .backup of last known good state
// - Recovery: Falls back to backup if corruption detected
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "sources": { "dns/office": { "metadata": {...}, "spec": {...}, "status": {...} } },
//   "endpoints": { "dns/office": { "metadata": {...}, "spec": { "endpoints": [...] } } },
//   "revision": 12
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use super::table::ObjectTable;
use crate::Error;
use crate::config::StoreConfig;
use crate::model::{DnsEndpoint, MerakiSource, ObjectKey};
use crate::traits::{ResourceStore, ResourceStoreFactory};

/// Store file format version
const STORE_FILE_VERSION: &str = "1.0";

/// File-based resource store with crash recovery
///
/// Every write is persisted before it becomes visible. A write that cannot
/// be persisted leaves both the file and the in-memory view untouched.
#[derive(Debug)]
pub struct FileResourceStore {
    path: PathBuf,
    table: Arc<RwLock<ObjectTable>>,
}

/// Serializable store file format
#[derive(Debug, Serialize, Deserialize)]
struct StoreFileFormat {
    version: String,
    #[serde(flatten)]
    table: ObjectTable,
}

impl FileResourceStore {
    /// Create or load a file store
    ///
    /// This will:
    /// 1. Create parent directories if needed
    /// 2. Try to load the existing store file
    /// 3. If it is corrupted, try the backup
    /// 4. If both fail, start empty
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::config(format!(
                    "Failed to create store directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let table = Self::load_with_recovery(&path).await?;

        Ok(Self {
            path,
            table: Arc::new(RwLock::new(table)),
        })
    }

    /// Load the table, falling back to the backup when the main file is corrupted
    async fn load_with_recovery(path: &Path) -> Result<ObjectTable, Error> {
        let e = match Self::load(path).await {
            Ok(table) => {
                tracing::debug!(
                    "Loaded store from {}: {} sources, {} endpoints",
                    path.display(),
                    table.source_count(),
                    table.endpoint_count()
                );
                return Ok(table);
            }
            Err(e @ Error::Json(_)) => e,
            Err(e) => return Err(e),
        };

        tracing::warn!(
            "Store file appears corrupted: {}. Attempting recovery from backup.",
            e
        );

        let backup_path = Self::backup_path(path);
        if !backup_path.exists() {
            tracing::warn!("No backup file found. Starting with an empty store.");
            return Ok(ObjectTable::new());
        }

        match Self::load(&backup_path).await {
            Ok(table) => {
                tracing::info!(
                    "Recovered store from backup: {} sources",
                    table.source_count()
                );
                if let Err(restore_err) = fs::copy(&backup_path, path).await {
                    tracing::error!("Failed to restore store file from backup: {}", restore_err);
                }
                Ok(table)
            }
            Err(backup_err) => {
                tracing::error!(
                    "Backup also corrupted: {}. Starting with an empty store.",
                    backup_err
                );
                Ok(ObjectTable::new())
            }
        }
    }

    /// Load a table from `path`
    ///
    /// A missing file is an empty table; undecodable content is `Error::Json`.
    async fn load(path: &Path) -> Result<ObjectTable, Error> {
        if !path.exists() {
            tracing::debug!("Store file does not exist: {}", path.display());
            return Ok(ObjectTable::new());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::store(format!("Failed to read store file {}: {}", path.display(), e))
        })?;

        let file: StoreFileFormat = serde_json::from_str(&content)?;

        if file.version != STORE_FILE_VERSION {
            tracing::warn!(
                "Store file version mismatch: expected {}, got {}. Attempting to load anyway.",
                STORE_FILE_VERSION,
                file.version
            );
        }

        Ok(file.table)
    }

    /// Write `table` to disk atomically, keeping a backup of the previous file
    async fn persist(&self, table: &ObjectTable) -> Result<(), Error> {
        let file = StoreFileFormat {
            version: STORE_FILE_VERSION.to_string(),
            table: table.clone(),
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| Error::store(format!("Failed to serialize store: {e}")))?;

        let temp_path = self.temp_path();
        {
            let mut temp = fs::File::create(&temp_path).await.map_err(|e| {
                Error::store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            temp.write_all(json.as_bytes()).await.map_err(|e| {
                Error::store(format!(
                    "Failed to write temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            temp.flush().await.map_err(|e| {
                Error::store(format!(
                    "Failed to flush temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        if self.path.exists()
            && let Err(e) = fs::copy(&self.path, Self::backup_path(&self.path)).await
        {
            tracing::warn!("Failed to create backup: {}", e);
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::trace!("Store written to {}", self.path.display());
        Ok(())
    }

    /// Apply `f` to a copy of the table, persist it, then publish it
    async fn mutate<T>(
        &self,
        f: impl FnOnce(&mut ObjectTable) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let mut guard = self.table.write().await;
        let mut next = guard.clone();
        let out = f(&mut next)?;
        self.persist(&next).await?;
        *guard = next;
        Ok(out)
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }
}

#[async_trait]
impl ResourceStore for FileResourceStore {
    async fn get_source(&self, key: &ObjectKey) -> Result<Option<MerakiSource>, Error> {
        Ok(self.table.read().await.get_source(key))
    }

    async fn get_endpoint(&self, key: &ObjectKey) -> Result<Option<DnsEndpoint>, Error> {
        Ok(self.table.read().await.get_endpoint(key))
    }

    async fn create_endpoint(&self, endpoint: &DnsEndpoint) -> Result<DnsEndpoint, Error> {
        self.mutate(|table| table.create_endpoint(endpoint)).await
    }

    async fn update_endpoint(&self, endpoint: &DnsEndpoint) -> Result<DnsEndpoint, Error> {
        self.mutate(|table| table.update_endpoint(endpoint)).await
    }

    async fn update_source_status(&self, source: &MerakiSource) -> Result<MerakiSource, Error> {
        self.mutate(|table| table.update_source_status(source)).await
    }

    async fn apply_source(&self, source: &MerakiSource) -> Result<MerakiSource, Error> {
        self.mutate(|table| Ok(table.apply_source(source))).await
    }

    async fn delete_source(&self, key: &ObjectKey) -> Result<bool, Error> {
        let removed = self.mutate(|table| Ok(table.delete_source(key))).await?;
        match removed {
            Some(endpoints) => {
                tracing::debug!("Deleted source {} and {} owned endpoints", key, endpoints.len());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_sources(&self) -> Result<Vec<ObjectKey>, Error> {
        Ok(self.table.read().await.list_sources())
    }

    async fn flush(&self) -> Result<(), Error> {
        // Writes are persisted immediately, this only refreshes the file
        let guard = self.table.read().await;
        self.persist(&guard).await
    }

    fn store_name(&self) -> &'static str {
        "file"
    }
}

/// Factory for creating file stores
pub struct FileResourceStoreFactory;

#[async_trait]
impl ResourceStoreFactory for FileResourceStoreFactory {
    async fn create(&self, config: &StoreConfig) -> Result<Arc<dyn ResourceStore>, Error> {
        match config {
            StoreConfig::File { path } => Ok(Arc::new(FileResourceStore::new(path).await?)),
            _ => Err(Error::config("Expected File store configuration")),
        }
    }
}
