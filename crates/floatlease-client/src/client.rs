//! The host-facing lease client.

use std::sync::Arc;

use tracing::info;

use floatlease_core::result::LeaseResult;
use floatlease_core::types::{DateCheckFlags, LeaseHandle, LeaseState, SaveFlags, ServerEndpoint, Version};

use crate::context::ClientContext;
use crate::dispatch::LeaseCallback;
use crate::session::LeaseSession;

/// A lease client bound to one product.
///
/// Cloning is cheap; clones share the same lease. Call [`cleanup`] when
/// done. A callback that holds a clone of its own client keeps the client
/// alive until then.
///
/// [`cleanup`]: LeaseClient::cleanup
#[derive(Clone)]
pub struct LeaseClient {
    ctx: Arc<ClientContext>,
    handle: LeaseHandle,
    session: Arc<LeaseSession>,
}

impl LeaseClient {
    /// Start opening a client for a product GUID from the loaded descriptor.
    pub fn builder(ctx: &Arc<ClientContext>, product_guid: impl Into<String>) -> LeaseClientBuilder {
        LeaseClientBuilder {
            ctx: Arc::clone(ctx),
            product_guid: product_guid.into(),
            callback: None,
        }
    }

    /// The handle identifying this client.
    pub fn handle(&self) -> LeaseHandle {
        self.handle
    }

    /// The product GUID this client leases.
    pub fn product_guid(&self) -> &str {
        &self.session.product().guid
    }

    /// Save the lease server for this product.
    pub async fn save_server(&self, host: &str, port: u16, flags: SaveFlags) -> LeaseResult<()> {
        self.session.ensure_open().await?;
        self.ctx
            .registry()
            .save(self.product_guid(), host, port, flags)
            .await
    }

    /// The saved lease server, or `None` when none is configured.
    pub async fn get_server(&self) -> LeaseResult<Option<ServerEndpoint>> {
        self.session.ensure_open().await?;
        self.ctx.registry().get(self.product_guid()).await
    }

    /// Acquire a lease from the saved server.
    pub async fn request_lease(&self) -> LeaseResult<()> {
        self.session.request_lease().await
    }

    /// Release the lease. Always leaves the client without a lease.
    pub async fn drop_lease(&self) {
        self.session.drop_lease().await
    }

    /// Whether a lease is held.
    pub async fn has_lease(&self) -> LeaseResult<bool> {
        self.session.has_lease().await
    }

    /// The current lease state.
    pub async fn state(&self) -> LeaseResult<LeaseState> {
        self.session.state().await
    }

    /// A license feature value, or an empty string when absent.
    pub fn get_feature_value(&self, name: &str) -> String {
        self.session.features().get(name)
    }

    /// Whether a license feature has a non-empty value.
    pub fn has_feature(&self, name: &str) -> bool {
        self.session.features().has(name)
    }

    /// Whether `date` (`YYYY-MM-DD hh:mm:ss`, UTC) has not passed.
    pub async fn is_date_valid(&self, date: &str) -> LeaseResult<bool> {
        self.is_date_valid_with(date, DateCheckFlags::HAS_NOT_EXPIRED).await
    }

    /// Whether `date` satisfies every check in `flags`.
    pub async fn is_date_valid_with(&self, date: &str, flags: DateCheckFlags) -> LeaseResult<bool> {
        self.session.is_date_valid(date, flags).await
    }

    /// Route TLS traffic through a proxy (`http://[user:pass@]host[:port]/`).
    /// An empty string removes it.
    pub async fn set_custom_proxy(&self, uri: &str) -> LeaseResult<()> {
        self.session.ensure_open().await?;
        self.ctx.set_custom_proxy(uri)
    }

    /// Release any lease, stop background work and invalidate the handle.
    pub async fn cleanup(&self) {
        self.session.close().await;
        info!(handle = %self.handle, "Lease client cleaned up");
    }

    /// The library version.
    pub fn get_version(&self) -> Version {
        self.ctx.version()
    }
}

impl std::fmt::Debug for LeaseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeaseClient")
            .field("handle", &self.handle)
            .field("product", &self.product_guid())
            .finish_non_exhaustive()
    }
}

/// Builder for [`LeaseClient`].
pub struct LeaseClientBuilder {
    ctx: Arc<ClientContext>,
    product_guid: String,
    callback: Option<Arc<dyn LeaseCallback>>,
}

impl LeaseClientBuilder {
    /// Handler for lease status events. Required before a lease can be
    /// requested.
    pub fn callback(mut self, callback: impl LeaseCallback) -> Self {
        self.callback = Some(Arc::new(callback));
        self
    }

    /// Like [`callback`](Self::callback), for a handler that is already shared.
    pub fn shared_callback(mut self, callback: Arc<dyn LeaseCallback>) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Resolve the product and open the client.
    ///
    /// Fails with `DatFile` when no descriptor is loaded or the product is
    /// not in it.
    pub async fn open(self) -> LeaseResult<LeaseClient> {
        let (handle, product) = self.ctx.resolve(&self.product_guid)?;
        let session = LeaseSession::open(Arc::clone(&self.ctx), product, self.callback);
        info!(%handle, product = %self.product_guid, "Lease client opened");
        Ok(LeaseClient {
            ctx: self.ctx,
            handle,
            session,
        })
    }
}
