//! The lease state machine.
//!
//! ```text
//!            request_lease                 renewal fails
//!   NONE ───────────────────▶ ACTIVE ─────────────────────▶ EXPIRED
//!    ▲  ◀─── drop / revoke ───  │  ▲                           ▲
//!    │                   sleep  ▼  │ resume, regained          │ resume, not regained
//!    │                      DROPPED_SLEEP ─────────────────────┘
//! ```
//!
//! Every transition happens under one async mutex. Events are queued for
//! the host callback while the mutex is held and delivered after it is
//! released.

mod lease;
mod renewal;
mod sleep;

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use chrono::{NaiveDateTime, Utc};
use tokio::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info, warn};
use uuid::Uuid;

use floatlease_core::error::LeaseError;
use floatlease_core::result::LeaseResult;
use floatlease_core::types::{CallbackEvent, DateCheckFlags, LeaseState, ServerEndpoint};

use crate::context::ClientContext;
use crate::descriptor::ProductEntry;
use crate::dispatch::{CallbackDispatcher, DispatchTicket, LeaseCallback};
use crate::features::FeatureStore;
use crate::transport::{Grant, LeaseRequest};

use self::lease::{Lease, SessionInner, StateCell};

/// Format accepted by date validation.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One product's lease and everything that keeps it alive.
pub(crate) struct LeaseSession {
    product: ProductEntry,
    ctx: Arc<ClientContext>,
    features: FeatureStore,
    dispatcher: Option<CallbackDispatcher>,
    client_id: Uuid,
    inner: Mutex<SessionInner>,
    cell: Arc<StateCell>,
    watcher: StdMutex<Option<JoinHandle<()>>>,
}

impl LeaseSession {
    /// Create a session and start watching for sleep/resume.
    pub fn open(
        ctx: Arc<ClientContext>,
        product: ProductEntry,
        callback: Option<Arc<dyn LeaseCallback>>,
    ) -> Arc<Self> {
        let power = ctx.power_monitor().map(|monitor| monitor.subscribe());
        let inner = SessionInner::default();
        let cell = inner.cell();
        let session = Arc::new(Self {
            product,
            ctx,
            features: FeatureStore::new(),
            dispatcher: callback.map(CallbackDispatcher::spawn),
            client_id: Uuid::new_v4(),
            inner: Mutex::new(inner),
            cell,
            watcher: StdMutex::new(None),
        });

        if let Some(rx) = power {
            let task = tokio::spawn(sleep::watch(Arc::downgrade(&session), rx));
            *session.watcher.lock().unwrap_or_else(|e| e.into_inner()) = Some(task);
        }

        debug!(product = %session.product.guid, client_id = %session.client_id, "Lease session opened");
        session
    }

    pub fn product(&self) -> &ProductEntry {
        &self.product
    }

    pub fn features(&self) -> &FeatureStore {
        &self.features
    }

    /// Lock the session state, failing once the session is closed.
    async fn lock_open(&self) -> LeaseResult<MutexGuard<'_, SessionInner>> {
        let inner = self.inner.lock().await;
        inner.ensure_open()?;
        Ok(inner)
    }

    /// Fails once the session is closed. Does not wait for the state lock.
    pub async fn ensure_open(&self) -> LeaseResult<()> {
        self.cell.ensure_open()
    }

    /// The current state. Does not wait for the state lock, so it answers
    /// even while a renewal is talking to the server.
    pub async fn state(&self) -> LeaseResult<LeaseState> {
        self.cell.state()
    }

    pub async fn has_lease(&self) -> LeaseResult<bool> {
        Ok(self.state().await?.is_active())
    }

    /// Acquire a lease and start renewing it.
    pub async fn request_lease(self: &Arc<Self>) -> LeaseResult<()> {
        let mut inner = self.lock_open().await?;

        if self.dispatcher.is_none() {
            return Err(LeaseError::NoCallback);
        }
        if inner.state() == LeaseState::Active {
            return Err(LeaseError::LeaseExists);
        }

        let endpoint = self
            .ctx
            .registry()
            .get(&self.product.guid)
            .await?
            .ok_or(LeaseError::Server)?;

        self.stop_renewal(&mut inner).await;

        match self.acquire(&endpoint).await {
            Ok(grant) => {
                self.activate(&mut inner, endpoint, grant);
                Ok(())
            }
            Err(e) => {
                warn!(
                    product = %self.product.guid,
                    error = %e,
                    disposition = ?e.disposition(),
                    "Lease request failed"
                );
                Err(e)
            }
        }
    }

    /// Give the lease back. Local state is always cleared; the server's
    /// answer is only logged. No event is raised.
    pub async fn drop_lease(&self) {
        let mut inner = self.inner.lock().await;
        if inner.is_closed() {
            return;
        }

        self.stop_renewal(&mut inner).await;
        let held = inner.end(LeaseState::None);
        self.features.clear();

        if let Some(lease) = held {
            self.release_quietly(&lease).await;
            info!(product = %self.product.guid, lease_id = %lease.id, "Lease dropped");
        }
    }

    /// Whether `date` (`YYYY-MM-DD hh:mm:ss`, UTC) satisfies `flags`
    /// against trusted time. A date that cannot be parsed is not valid.
    pub async fn is_date_valid(&self, date: &str, flags: DateCheckFlags) -> LeaseResult<bool> {
        if flags.is_empty() {
            return Err(LeaseError::Flags);
        }
        let now = self.lock_open().await?.clock.now();

        let Ok(date) = NaiveDateTime::parse_from_str(date.trim(), DATE_FORMAT) else {
            debug!(date, "Unparseable date");
            return Ok(false);
        };

        let mut valid = true;
        if flags.contains(DateCheckFlags::HAS_NOT_EXPIRED) {
            valid &= date.and_utc() >= now;
        }
        Ok(valid)
    }

    /// Tear the session down: stop every task, release a held lease,
    /// deliver queued events and refuse further calls.
    pub async fn close(&self) {
        {
            let mut inner = self.inner.lock().await;
            if inner.is_closed() {
                return;
            }
            inner.close();

            self.stop_renewal(&mut inner).await;
            let held = inner.end(LeaseState::None);
            self.features.clear();
            if let Some(lease) = held {
                self.release_quietly(&lease).await;
            }
        }

        let watcher = self.watcher.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(task) = watcher {
            task.abort();
            let _ = task.await;
        }

        if let Some(dispatcher) = &self.dispatcher {
            dispatcher.shutdown().await;
        }
        info!(product = %self.product.guid, "Lease session closed");
    }

    /// Ask the server for a lease and check its clock.
    async fn acquire(&self, endpoint: &ServerEndpoint) -> LeaseResult<Grant> {
        let config = &self.ctx.config().lease;
        let request = LeaseRequest {
            product_guid: self.product.guid.clone(),
            product_version: self.product.version.clone(),
            client_id: self.client_id,
            username: config.effective_username(),
        };
        let call = self.ctx.transport_context(endpoint);

        debug!(product = %request.product_guid, %endpoint, "Requesting lease");
        let grant = time::timeout(
            config.request_timeout(),
            self.ctx.transport().grant(&call, &request),
        )
        .await??;

        let skew = Duration::from_secs((grant.server_time - Utc::now()).num_seconds().unsigned_abs());
        if skew > config.max_clock_skew() {
            warn!(
                skew = ?skew,
                limit = ?config.max_clock_skew(),
                server_time = %grant.server_time,
                "Local clock disagrees with the lease server"
            );
            let lease = Lease::new(grant.lease_id, endpoint.clone(), grant.server_time, grant.lease_duration);
            self.release_quietly(&lease).await;
            return Err(LeaseError::WrongTime);
        }

        Ok(grant)
    }

    /// Enter `Active` with a fresh grant and schedule its renewal.
    fn activate(self: &Arc<Self>, inner: &mut SessionInner, endpoint: ServerEndpoint, grant: Grant) {
        let renew_in = self.ctx.config().lease.renew_after(grant.lease_duration);

        inner.clock.anchor(grant.server_time);
        self.features.replace(grant.features);
        inner.set_state(LeaseState::Active);
        inner.renewal = Some(tokio::spawn(renewal::run(
            Arc::downgrade(self),
            grant.lease_id.clone(),
            renew_in,
        )));

        info!(
            product = %self.product.guid,
            lease_id = %grant.lease_id,
            duration = ?grant.lease_duration,
            renew_in = ?renew_in,
            "Lease acquired"
        );
        inner.lease = Some(Lease::new(
            grant.lease_id,
            endpoint,
            grant.server_time,
            grant.lease_duration,
        ));
    }

    /// Cancel the renewal task and wait until it has stopped.
    async fn stop_renewal(&self, inner: &mut SessionInner) {
        if let Some(task) = inner.renewal.take() {
            task.abort();
            let _ = task.await;
        }
    }

    /// Release a lease, logging rather than returning any failure.
    async fn release_quietly(&self, lease: &Lease) {
        let call = self.ctx.transport_context(&lease.endpoint);
        let timeout = self.ctx.config().lease.release_timeout();

        match time::timeout(timeout, self.ctx.transport().release(&call, &lease.id)).await {
            Ok(Ok(())) => debug!(lease_id = %lease.id, granted_at = %lease.granted_at, "Lease released"),
            Ok(Err(e)) => warn!(lease_id = %lease.id, "Lease release failed: {}", e),
            Err(_) => warn!(lease_id = %lease.id, ?timeout, "Lease release timed out"),
        }
    }

    /// Queue an event for the host callback.
    fn notify(&self, event: CallbackEvent) -> DispatchTicket {
        match &self.dispatcher {
            Some(dispatcher) => dispatcher.enqueue(event),
            None => DispatchTicket::none(),
        }
    }
}

impl Drop for LeaseSession {
    fn drop(&mut self) {
        if let Some(task) = self.inner.get_mut().renewal.take() {
            task.abort();
        }
        if let Some(task) = self.watcher.get_mut().unwrap_or_else(|e| e.into_inner()).take() {
            task.abort();
        }
    }
}
