//! Shared client state.
//!
//! A [`ClientContext`] owns what a native licensing library would keep in
//! process globals: configuration, the transport, the server registry, the
//! loaded product descriptor, the custom proxy and handle allocation. Each
//! context is independent, so several can coexist in one process.

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock};

use tracing::info;

use floatlease_core::config::ClientConfig;
use floatlease_core::error::LeaseError;
use floatlease_core::result::LeaseResult;
use floatlease_core::types::{LeaseHandle, ProxyConfig, ServerEndpoint, Version};

use crate::descriptor::{ProductDescriptor, ProductEntry};
use crate::power::{ClockDriftMonitor, PowerMonitor};
use crate::registry::{PrivilegeProbe, ServerRegistry, StoreWritableProbe};
use crate::transport::{LeaseTransport, TransportContext};

/// Configuration, transport and process-wide settings shared by clients.
pub struct ClientContext {
    config: ClientConfig,
    transport: Arc<dyn LeaseTransport>,
    registry: ServerRegistry,
    power: Option<Arc<dyn PowerMonitor>>,
    descriptor: RwLock<Option<Arc<ProductDescriptor>>>,
    proxy: RwLock<Option<ProxyConfig>>,
    next_handle: AtomicU32,
}

impl ClientContext {
    /// Start building a context around a transport.
    pub fn builder(transport: Arc<dyn LeaseTransport>) -> ClientContextBuilder {
        ClientContextBuilder {
            transport,
            config: ClientConfig::default(),
            privilege: None,
            power: None,
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The lease server transport.
    pub fn transport(&self) -> &Arc<dyn LeaseTransport> {
        &self.transport
    }

    /// The saved server locations.
    pub fn registry(&self) -> &ServerRegistry {
        &self.registry
    }

    /// The sleep/resume source, if sleep handling is enabled.
    pub fn power_monitor(&self) -> Option<&Arc<dyn PowerMonitor>> {
        self.power.as_ref()
    }

    /// Load the product descriptor from a file, replacing any loaded one.
    pub async fn load_descriptor(&self, path: impl AsRef<Path>) -> LeaseResult<()> {
        let descriptor = ProductDescriptor::load(path.as_ref()).await?;
        self.install_descriptor(descriptor);
        Ok(())
    }

    /// Load the product descriptor from a JSON document.
    pub fn load_descriptor_str(&self, text: &str) -> LeaseResult<()> {
        let descriptor = ProductDescriptor::from_json(text)?;
        self.install_descriptor(descriptor);
        Ok(())
    }

    fn install_descriptor(&self, descriptor: ProductDescriptor) {
        info!(products = descriptor.products.len(), "Product descriptor loaded");
        *self.descriptor.write().unwrap_or_else(|e| e.into_inner()) = Some(Arc::new(descriptor));
    }

    /// Resolve a product GUID to a fresh handle.
    pub(crate) fn resolve(&self, guid: &str) -> LeaseResult<(LeaseHandle, ProductEntry)> {
        let descriptor = self
            .descriptor
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or_else(|| {
                tracing::error!("No product descriptor loaded");
                LeaseError::DatFile
            })?;

        let product = descriptor.find(guid).cloned().ok_or_else(|| {
            tracing::error!(product = guid, "Product not found in descriptor");
            LeaseError::DatFile
        })?;

        let raw = self.next_handle.fetch_add(1, Ordering::Relaxed);
        let handle = LeaseHandle::new(raw).ok_or_else(|| LeaseError::fail("lease handles exhausted"))?;
        Ok((handle, product))
    }

    /// Set or clear the proxy used for TLS traffic. An empty string clears it.
    pub fn set_custom_proxy(&self, uri: &str) -> LeaseResult<()> {
        let proxy = if uri.trim().is_empty() {
            None
        } else {
            Some(ProxyConfig::parse(uri)?)
        };

        match &proxy {
            Some(p) => info!(proxy = %p, "Custom proxy set"),
            None => info!("Custom proxy cleared"),
        }
        *self.proxy.write().unwrap_or_else(|e| e.into_inner()) = proxy;
        Ok(())
    }

    /// The configured custom proxy.
    pub fn proxy(&self) -> Option<ProxyConfig> {
        self.proxy.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Call parameters for an endpoint. The proxy only applies to TLS.
    pub(crate) fn transport_context(&self, endpoint: &ServerEndpoint) -> TransportContext {
        TransportContext {
            endpoint: endpoint.clone(),
            proxy: endpoint.use_tls().then(|| self.proxy()).flatten(),
        }
    }

    /// The library version.
    pub fn version(&self) -> Version {
        Version::current()
    }
}

impl std::fmt::Debug for ClientContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientContext")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("proxy", &self.proxy())
            .finish_non_exhaustive()
    }
}

/// Builder for [`ClientContext`].
pub struct ClientContextBuilder {
    transport: Arc<dyn LeaseTransport>,
    config: ClientConfig,
    privilege: Option<Arc<dyn PrivilegeProbe>>,
    power: Option<Arc<dyn PowerMonitor>>,
}

impl ClientContextBuilder {
    /// Use this configuration instead of the defaults.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Decide elevation with this probe instead of testing the
    /// machine-wide store directory.
    pub fn privilege(mut self, probe: Arc<dyn PrivilegeProbe>) -> Self {
        self.privilege = Some(probe);
        self
    }

    /// Take sleep/resume notifications from this monitor.
    pub fn power_monitor(mut self, monitor: Arc<dyn PowerMonitor>) -> Self {
        self.power = Some(monitor);
        self
    }

    /// Build the context.
    pub fn build(self) -> Arc<ClientContext> {
        let privilege = self
            .privilege
            .unwrap_or_else(|| Arc::new(StoreWritableProbe::new(self.config.registry.system_path())));

        let power = match self.power {
            Some(monitor) => Some(monitor),
            None if self.config.power.detect_sleep => {
                Some(Arc::new(ClockDriftMonitor::new(&self.config.power)) as Arc<dyn PowerMonitor>)
            }
            None => None,
        };

        let registry = ServerRegistry::new(&self.config.registry, privilege);

        Arc::new(ClientContext {
            config: self.config,
            transport: self.transport,
            registry,
            power,
            descriptor: RwLock::new(None),
            proxy: RwLock::new(None),
            next_handle: AtomicU32::new(1),
        })
    }
}
