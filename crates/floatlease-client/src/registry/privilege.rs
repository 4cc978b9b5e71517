//! Elevation checks for machine-wide saves.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use uuid::Uuid;

/// Decides whether the process may write machine-wide settings.
#[async_trait]
pub trait PrivilegeProbe: Send + Sync + 'static {
    /// Whether the current process is elevated.
    async fn is_elevated(&self) -> bool;
}

/// Treats the process as elevated when it can create files in the
/// machine-wide store directory.
#[derive(Debug, Clone)]
pub struct StoreWritableProbe {
    dir: PathBuf,
}

impl StoreWritableProbe {
    /// Probe the given directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl PrivilegeProbe for StoreWritableProbe {
    async fn is_elevated(&self) -> bool {
        if fs::create_dir_all(&self.dir).await.is_err() {
            return false;
        }

        let probe = self.dir.join(format!(".probe-{}", Uuid::new_v4().simple()));
        match fs::write(&probe, b"").await {
            Ok(()) => {
                if let Err(e) = fs::remove_file(&probe).await {
                    tracing::warn!(path = %probe.display(), "Failed to remove privilege probe: {}", e);
                }
                true
            }
            Err(e) => {
                tracing::debug!(dir = %self.dir.display(), "Not elevated: {}", e);
                false
            }
        }
    }
}

/// A fixed answer, for hosts that know their privilege level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticPrivilege(pub bool);

#[async_trait]
impl PrivilegeProbe for StaticPrivilege {
    async fn is_elevated(&self) -> bool {
        self.0
    }
}
