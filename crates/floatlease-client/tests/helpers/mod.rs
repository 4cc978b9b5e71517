//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::mpsc;

use floatlease_client::{ClientContext, LeaseCallback, LeaseClient, MockLeaseServer, PowerSignal, StaticPrivilege};
use floatlease_core::config::ClientConfig;
use floatlease_core::types::{CallbackEvent, LeaseState, SaveFlags};

/// Product GUID present in the test descriptor.
pub const PRODUCT: &str = "18324776654b3946fc44a5f3.49025204";

/// Test descriptor document.
pub const DESCRIPTOR: &str = r#"{
    "products": [
        { "guid": "18324776654b3946fc44a5f3.49025204", "name": "Editor", "version": "4.2" }
    ]
}"#;

/// Longest a test waits for an event. Under a paused clock this is virtual.
const EVENT_WAIT: Duration = Duration::from_secs(3600);

/// A context wired to an in-memory server and a manual power signal.
pub struct TestEnv {
    /// Keeps the registry directories alive.
    pub dir: TempDir,
    pub server: Arc<MockLeaseServer>,
    pub power: PowerSignal,
    pub ctx: Arc<ClientContext>,
}

impl TestEnv {
    /// Create an environment with ten seats and an unelevated process.
    pub fn new() -> Self {
        Self::with_server(MockLeaseServer::new(), false)
    }

    /// Create an environment around a prepared server.
    pub fn with_server(server: MockLeaseServer, elevated: bool) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let server = Arc::new(server);
        let power = PowerSignal::new();
        let ctx = build_context(&dir, &server, &power, elevated);
        Self {
            dir,
            server,
            power,
            ctx,
        }
    }

    /// A second context over the same registry, server and power signal,
    /// as another process on the machine would see them.
    pub fn other_process(&self, elevated: bool) -> Arc<ClientContext> {
        build_context(&self.dir, &self.server, &self.power, elevated)
    }

    /// Open a client whose events are recorded.
    pub async fn client(&self) -> (LeaseClient, EventLog) {
        let (recorder, events) = recorder();
        let client = LeaseClient::builder(&self.ctx, PRODUCT)
            .callback(recorder)
            .open()
            .await
            .expect("Failed to open client");
        (client, events)
    }

    /// Open a client with a saved server.
    pub async fn configured_client(&self) -> (LeaseClient, EventLog) {
        let (client, events) = self.client().await;
        client
            .save_server("lic.example.com", 13, SaveFlags::USER)
            .await
            .expect("Failed to save server");
        (client, events)
    }

    /// Open a client that already holds a lease.
    pub async fn leased_client(&self) -> (LeaseClient, EventLog) {
        let (client, events) = self.configured_client().await;
        client.request_lease().await.expect("Failed to request lease");
        (client, events)
    }
}

fn build_context(
    dir: &TempDir,
    server: &Arc<MockLeaseServer>,
    power: &PowerSignal,
    elevated: bool,
) -> Arc<ClientContext> {
    let mut config = ClientConfig::default();
    config.power.detect_sleep = false;
    config.lease.username = Some("tester".to_string());
    config.registry.user_dir = dir.path().join("user").to_string_lossy().into_owned();
    config.registry.system_dir = dir.path().join("system").to_string_lossy().into_owned();

    let ctx = ClientContext::builder(server.clone())
        .config(config)
        .privilege(Arc::new(StaticPrivilege(elevated)))
        .power_monitor(Arc::new(power.clone()))
        .build();
    ctx.load_descriptor_str(DESCRIPTOR)
        .expect("Failed to load test descriptor");
    ctx
}

/// Events received by a recording callback.
pub struct EventLog {
    rx: mpsc::UnboundedReceiver<CallbackEvent>,
}

impl EventLog {
    /// Wait for the next event.
    pub async fn next(&mut self) -> CallbackEvent {
        tokio::time::timeout(EVENT_WAIT, self.rx.recv())
            .await
            .expect("Timed out waiting for a lease event")
            .expect("Callback dropped")
    }

    /// An event that has already been delivered, if any.
    pub fn try_next(&mut self) -> Option<CallbackEvent> {
        self.rx.try_recv().ok()
    }
}

/// A callback that records every event, and the log it records into.
pub fn recorder() -> (impl LeaseCallback, EventLog) {
    let (tx, rx) = mpsc::unbounded_channel();
    let callback = move |event: CallbackEvent| {
        let _ = tx.send(event);
    };
    (callback, EventLog { rx })
}

/// Poll until the client reaches `state`.
pub async fn wait_for_state(client: &LeaseClient, state: LeaseState) {
    for _ in 0..500 {
        if client.state().await.expect("Client closed") == state {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("Client never reached {state}");
}
