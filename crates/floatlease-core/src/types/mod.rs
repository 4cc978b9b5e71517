//! Shared domain types.

pub mod endpoint;
pub mod event;
pub mod flags;
pub mod handle;
pub mod proxy;
pub mod state;
pub mod version;

pub use endpoint::{ServerEndpoint, ServerScope};
pub use event::CallbackEvent;
pub use flags::{DateCheckFlags, SaveFlags};
pub use handle::LeaseHandle;
pub use proxy::ProxyConfig;
pub use state::LeaseState;
pub use version::Version;
