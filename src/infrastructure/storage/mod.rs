//! File-based permission storage

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::application::errors::StorageError;
use crate::domain::traits::{Grants, PermissionStore};
use crate::infrastructure::config::{PermissionsConfig, StoreBackend};
use crate::infrastructure::database::SqlitePermissionStore;

/// On-disk layout of the grants file
#[derive(Debug, Default, Serialize, Deserialize)]
struct GrantsFile {
    version: u32,
    grants: Grants,
}

const FILE_VERSION: u32 = 1;

/// JSON file-based grant store.
///
/// The whole file is rewritten on every change through a temp file and a
/// rename, so a crash never leaves a half-written file behind.
pub struct JsonPermissionStore {
    path: PathBuf,
    grants: Mutex<Grants>,
}

impl JsonPermissionStore {
    /// Open the store, creating the parent directory. A missing file means no grants.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let grants = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Grants::new(),
            Ok(bytes) => serde_json::from_slice::<GrantsFile>(&bytes)?.grants,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Grants::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            grants: Mutex::new(grants),
        })
    }

    async fn persist(&self, grants: &Grants) -> Result<(), StorageError> {
        let file = GrantsFile {
            version: FILE_VERSION,
            grants: grants.clone(),
        };
        let json = serde_json::to_vec_pretty(&file)?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl PermissionStore for JsonPermissionStore {
    async fn load(&self) -> Result<Grants, StorageError> {
        Ok(self.grants.lock().await.clone())
    }

    async fn grant(&self, identity: &str, command: &str) -> Result<(), StorageError> {
        let mut grants = self.grants.lock().await;
        let mut next = grants.clone();
        if !next.entry(identity.to_string()).or_default().insert(command.to_string()) {
            return Ok(());
        }
        self.persist(&next).await?;
        *grants = next;
        Ok(())
    }

    async fn revoke(&self, identity: &str, command: &str) -> Result<bool, StorageError> {
        let mut grants = self.grants.lock().await;
        let mut next = grants.clone();
        let Some(set) = next.get_mut(identity) else {
            return Ok(false);
        };
        if !set.remove(command) {
            return Ok(false);
        }
        if set.is_empty() {
            next.remove(identity);
        }
        self.persist(&next).await?;
        *grants = next;
        Ok(true)
    }

    fn backend(&self) -> &'static str {
        "json"
    }
}

/// Open the backend named in the configuration
pub async fn open(config: &PermissionsConfig) -> Result<Arc<dyn PermissionStore>, StorageError> {
    match config.backend {
        StoreBackend::Json => Ok(Arc::new(JsonPermissionStore::open(&config.path).await?)),
        StoreBackend::Sqlite => Ok(Arc::new(SqlitePermissionStore::open(&config.path).await?)),
    }
}
