//! Persisted lease server locations.
//!
//! Each product can have a server saved for the current user and one saved
//! machine-wide. Lookups prefer the user's choice. Machine-wide saves need
//! elevation the first time; an elevated save unlocks the product so that
//! later unelevated saves to the machine-wide scope are accepted. The
//! unlock is never revoked.

pub mod privilege;
pub mod store;

use std::sync::Arc;

use tracing::{debug, info, warn};

use floatlease_core::config::registry::RegistryConfig;
use floatlease_core::error::LeaseError;
use floatlease_core::result::LeaseResult;
use floatlease_core::types::{SaveFlags, ServerEndpoint, ServerScope};

pub use privilege::{PrivilegeProbe, StaticPrivilege, StoreWritableProbe};
pub use store::{ProductRecord, ScopeStore};

/// Saved server locations for both scopes.
pub struct ServerRegistry {
    user: ScopeStore,
    system: ScopeStore,
    privilege: Arc<dyn PrivilegeProbe>,
}

impl ServerRegistry {
    /// Open the registry described by `config`.
    pub fn new(config: &RegistryConfig, privilege: Arc<dyn PrivilegeProbe>) -> Self {
        Self {
            user: ScopeStore::new(config.user_path()),
            system: ScopeStore::new(config.system_path()),
            privilege,
        }
    }

    /// Save the server for a product.
    ///
    /// Validation runs before any privilege check. An elevated
    /// machine-wide save with an empty host only unlocks the product.
    pub async fn save(&self, guid: &str, host: &str, port: u16, flags: SaveFlags) -> LeaseResult<()> {
        let scope = flags.scope()?;

        if scope == ServerScope::System && host.trim().is_empty() {
            if !self.privilege.is_elevated().await {
                return Err(LeaseError::BadHostAddress);
            }
            self.system
                .update(guid, |record| {
                    record.unlocked = true;
                    Ok(())
                })
                .await?;
            self.open_system_store().await;
            info!(product = guid, "Machine-wide server setting unlocked");
            return Ok(());
        }

        let endpoint = ServerEndpoint::new(host, port, flags)?;

        match scope {
            ServerScope::User => {
                self.user
                    .update(guid, |record| {
                        record.endpoint = Some(endpoint.clone());
                        Ok(())
                    })
                    .await?;
            }
            ServerScope::System => {
                let elevated = self.privilege.is_elevated().await;
                self.system
                    .update(guid, |record| {
                        if elevated {
                            record.unlocked = true;
                        } else if !record.unlocked {
                            return Err(LeaseError::Permission);
                        }
                        record.endpoint = Some(endpoint.clone());
                        Ok(())
                    })
                    .await
                    .inspect_err(|e| {
                        if *e == LeaseError::Permission {
                            warn!(product = guid, "Machine-wide save refused: not elevated");
                        }
                    })?;
                if elevated {
                    self.open_system_store().await;
                }
            }
        }

        info!(product = guid, %endpoint, "Lease server saved");
        Ok(())
    }

    /// The server to use for a product: the user's choice, else the
    /// machine-wide one. `None` when neither scope has a server saved.
    pub async fn get(&self, guid: &str) -> LeaseResult<Option<ServerEndpoint>> {
        if let Some(endpoint) = self.user.record(guid).await?.endpoint {
            return Ok(Some(endpoint));
        }
        let endpoint = self.system.record(guid).await?.endpoint;
        if endpoint.is_none() {
            debug!(product = guid, "No lease server configured");
        }
        Ok(endpoint)
    }

    async fn open_system_store(&self) {
        if let Err(e) = self.system.open_to_all_users().await {
            warn!(
                path = %self.system.path().display(),
                "Failed to open machine-wide registry to all users: {}", e
            );
        }
    }
}

impl std::fmt::Debug for ServerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerRegistry")
            .field("user", &self.user.dir())
            .field("system", &self.system.dir())
            .finish_non_exhaustive()
    }
}
