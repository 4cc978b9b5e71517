//! JSON file backing one registry scope.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

use floatlease_core::error::LeaseError;
use floatlease_core::result::LeaseResult;
use floatlease_core::types::ServerEndpoint;

/// File name of the store inside a scope directory.
pub const STORE_FILE: &str = "servers.json";

/// What is saved for one product.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    /// The saved server, if any.
    #[serde(default)]
    pub endpoint: Option<ServerEndpoint>,
    /// Set by an elevated save; lets later unelevated saves through.
    #[serde(default)]
    pub unlocked: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    #[serde(default)]
    products: BTreeMap<String, ProductRecord>,
}

/// One scope's store file. Updates within a process are serialized.
#[derive(Debug)]
pub struct ScopeStore {
    dir: PathBuf,
    path: PathBuf,
    lock: Mutex<()>,
}

impl ScopeStore {
    /// A store living in `dir`. Nothing is touched until the first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let path = dir.join(STORE_FILE);
        Self {
            dir,
            path,
            lock: Mutex::new(()),
        }
    }

    /// The store directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The store file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The record saved for a product; a default record if nothing is saved.
    pub async fn record(&self, guid: &str) -> LeaseResult<ProductRecord> {
        let _guard = self.lock.lock().await;
        let mut doc = self.read().await?;
        Ok(doc.products.remove(guid).unwrap_or_default())
    }

    /// Apply `change` to a product's record and write the store back.
    ///
    /// If `change` fails, nothing is written.
    pub async fn update<F>(&self, guid: &str, change: F) -> LeaseResult<ProductRecord>
    where
        F: FnOnce(&mut ProductRecord) -> LeaseResult<()>,
    {
        let _guard = self.lock.lock().await;
        let mut doc = self.read().await?;
        let record = doc.products.entry(guid.to_string()).or_default();
        change(record)?;
        let updated = record.clone();

        fs::create_dir_all(&self.dir).await?;
        let data = serde_json::to_vec_pretty(&doc)?;
        fs::write(&self.path, &data).await?;

        debug!(path = %self.path.display(), product = guid, "Server registry written");
        Ok(updated)
    }

    /// Let every local user write the store file.
    #[cfg(unix)]
    pub async fn open_to_all_users(&self) -> LeaseResult<()> {
        use std::os::unix::fs::PermissionsExt;

        fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o666)).await?;
        Ok(())
    }

    /// Let every local user write the store file.
    #[cfg(not(unix))]
    pub async fn open_to_all_users(&self) -> LeaseResult<()> {
        Ok(())
    }

    async fn read(&self) -> LeaseResult<StoreDocument> {
        match fs::read(&self.path).await {
            Ok(data) => serde_json::from_slice(&data).map_err(|e| {
                tracing::error!(path = %self.path.display(), "Corrupt server registry: {}", e);
                LeaseError::from(e)
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoreDocument::default()),
            Err(e) => Err(e.into()),
        }
    }
}
