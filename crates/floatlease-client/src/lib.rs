//! # floatlease-client
//!
//! Client side of floating-license leasing. A host builds a
//! [`ClientContext`] around a [`LeaseTransport`], loads its product
//! descriptor and opens a [`LeaseClient`] per product with a callback. The
//! client saves the lease server location, acquires a lease, renews it in
//! the background, reacts to sleep and resume, exposes the license features
//! that came with the lease and reports lease-ending events through the
//! callback.
//!
//! ```no_run
//! # async fn demo() -> floatlease_core::LeaseResult<()> {
//! use std::sync::Arc;
//! use floatlease_client::{ClientContext, LeaseClient, MockLeaseServer};
//! use floatlease_core::types::{CallbackEvent, SaveFlags};
//!
//! let ctx = ClientContext::builder(Arc::new(MockLeaseServer::new())).build();
//! ctx.load_descriptor("product.json").await?;
//!
//! let client = LeaseClient::builder(&ctx, "18324776654b3946fc44a5f3.49025204")
//!     .callback(|event: CallbackEvent| tracing::warn!(%event, "lease status changed"))
//!     .open()
//!     .await?;
//! client.save_server("floating.example.com", 443, SaveFlags::USER).await?;
//! client.request_lease().await?;
//! let edition = client.get_feature_value("edition");
//! # let _ = edition;
//! client.cleanup().await;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod context;
pub mod descriptor;
pub mod dispatch;
pub mod features;
pub mod power;
pub mod registry;
mod session;
pub mod transport;

pub use client::{LeaseClient, LeaseClientBuilder};
pub use context::{ClientContext, ClientContextBuilder};
pub use dispatch::LeaseCallback;
pub use power::{ClockDriftMonitor, PowerEvent, PowerMonitor, PowerSignal};
pub use registry::{PrivilegeProbe, ServerRegistry, StaticPrivilege, StoreWritableProbe};
pub use session::DATE_FORMAT;
pub use transport::{LeaseTransport, TransportContext};

#[cfg(feature = "mock")]
pub use transport::MockLeaseServer;
