//! Seam to the remote lease server.
//!
//! The wire protocol is opaque to this crate: anything that can grant,
//! renew and release leases implements [`LeaseTransport`]. Transports
//! report failures as [`LeaseError`] variants; timeouts are enforced by the
//! session, not the transport.

#[cfg(feature = "mock")]
pub mod mock;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use floatlease_core::result::LeaseResult;
use floatlease_core::types::{ProxyConfig, ServerEndpoint};

#[cfg(feature = "mock")]
pub use mock::MockLeaseServer;

/// Feature name to value mapping delivered with a lease.
pub type FeatureMap = HashMap<String, String>;

/// Where and how to reach the server for one call.
#[derive(Debug, Clone)]
pub struct TransportContext {
    /// The saved server location.
    pub endpoint: ServerEndpoint,
    /// Proxy for TLS traffic, if one is configured.
    pub proxy: Option<ProxyConfig>,
}

/// Parameters of a lease request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaseRequest {
    /// Product GUID from the descriptor.
    pub product_guid: String,
    /// Product version from the descriptor.
    pub product_version: String,
    /// Unique id of the requesting client instance.
    pub client_id: Uuid,
    /// OS user requesting the seat.
    pub username: String,
}

/// A successful lease grant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grant {
    /// Server-assigned lease identifier.
    pub lease_id: String,
    /// The server's clock when the grant was issued.
    pub server_time: DateTime<Utc>,
    /// How long the lease lasts without renewal.
    pub lease_duration: Duration,
    /// License feature values.
    pub features: FeatureMap,
}

/// A successful renewal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Renewal {
    /// The server's clock when the renewal was issued.
    pub server_time: DateTime<Utc>,
    /// How long the lease lasts from now without renewal.
    pub lease_duration: Duration,
    /// New feature values when they changed since the last grant or renewal.
    pub features: Option<FeatureMap>,
}

/// Outcome of a renew call that reached the server.
#[derive(Debug, Clone)]
pub enum RenewOutcome {
    /// The lease was extended.
    Renewed(Renewal),
    /// The server no longer knows the lease; it was revoked.
    Revoked,
}

/// Operations consumed from the lease server.
#[async_trait]
pub trait LeaseTransport: Send + Sync + 'static {
    /// Request a new lease.
    async fn grant(&self, ctx: &TransportContext, request: &LeaseRequest) -> LeaseResult<Grant>;

    /// Extend an existing lease.
    async fn renew(&self, ctx: &TransportContext, lease_id: &str) -> LeaseResult<RenewOutcome>;

    /// Give a lease back to the pool.
    async fn release(&self, ctx: &TransportContext, lease_id: &str) -> LeaseResult<()>;
}
