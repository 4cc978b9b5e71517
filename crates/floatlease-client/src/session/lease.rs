//! Lease record and trusted time.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use floatlease_core::error::LeaseError;
use floatlease_core::result::LeaseResult;
use floatlease_core::types::{LeaseState, ServerEndpoint};

/// The lease currently held from the server.
#[derive(Debug, Clone)]
pub(crate) struct Lease {
    pub id: String,
    /// Server the lease was granted by; renewals and release go there too.
    pub endpoint: ServerEndpoint,
    pub granted_at: DateTime<Utc>,
    pub expires_at: Instant,
}

impl Lease {
    pub fn new(id: String, endpoint: ServerEndpoint, granted_at: DateTime<Utc>, duration: Duration) -> Self {
        Self {
            id,
            endpoint,
            granted_at,
            expires_at: deadline(duration),
        }
    }

    /// Push the expiry out after a renewal.
    pub fn extend(&mut self, duration: Duration) {
        self.expires_at = deadline(duration);
    }

    /// Time left before the lease lapses.
    pub fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }
}

/// `duration` from now, saturating at roughly thirty years out.
fn deadline(duration: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(duration)
        .unwrap_or_else(|| now + Duration::from_secs(86400 * 365 * 30))
}

/// Server time carried forward by the monotonic clock.
///
/// Falls back to the local wall clock until a server time is known.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct TrustedClock {
    anchor: Option<(DateTime<Utc>, Instant)>,
}

impl TrustedClock {
    /// Record a server timestamp observed just now.
    pub fn anchor(&mut self, server_time: DateTime<Utc>) {
        self.anchor = Some((server_time, Instant::now()));
    }

    pub fn now(&self) -> DateTime<Utc> {
        match self.anchor {
            Some((server_time, seen_at)) => chrono::Duration::from_std(seen_at.elapsed())
                .ok()
                .and_then(|elapsed| server_time.checked_add_signed(elapsed))
                .unwrap_or(server_time),
            None => Utc::now(),
        }
    }
}

/// Copy of the session state readable without the session lock.
///
/// Only written through [`SessionInner`], so it always matches the state
/// behind the lock once the writer has released it.
#[derive(Debug, Default)]
pub(crate) struct StateCell {
    state: AtomicU8,
    closed: AtomicBool,
}

impl StateCell {
    pub fn ensure_open(&self) -> LeaseResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(LeaseError::InvalidHandle);
        }
        Ok(())
    }

    pub fn state(&self) -> LeaseResult<LeaseState> {
        self.ensure_open()?;
        Ok(match self.state.load(Ordering::Acquire) {
            1 => LeaseState::Active,
            2 => LeaseState::DroppedSleep,
            3 => LeaseState::Expired,
            _ => LeaseState::None,
        })
    }

    fn store(&self, state: LeaseState) {
        let raw = match state {
            LeaseState::None => 0,
            LeaseState::Active => 1,
            LeaseState::DroppedSleep => 2,
            LeaseState::Expired => 3,
        };
        self.state.store(raw, Ordering::Release);
    }
}

/// State guarded by the session lock.
#[derive(Debug, Default)]
pub(crate) struct SessionInner {
    state: LeaseState,
    closed: bool,
    cell: Arc<StateCell>,
    pub lease: Option<Lease>,
    pub renewal: Option<JoinHandle<()>>,
    pub clock: TrustedClock,
}

impl SessionInner {
    /// The lock-free view of this state.
    pub fn cell(&self) -> Arc<StateCell> {
        Arc::clone(&self.cell)
    }

    pub fn state(&self) -> LeaseState {
        self.state
    }

    pub fn set_state(&mut self, state: LeaseState) {
        self.state = state;
        self.cell.store(state);
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Refuse every further call on the session.
    pub fn close(&mut self) {
        self.closed = true;
        self.cell.closed.store(true, Ordering::Release);
    }

    pub fn ensure_open(&self) -> LeaseResult<()> {
        if self.closed {
            return Err(LeaseError::InvalidHandle);
        }
        Ok(())
    }

    /// Whether `lease_id` is still the active lease.
    pub fn holds(&self, lease_id: &str) -> bool {
        !self.closed
            && self.state == LeaseState::Active
            && self.lease.as_ref().is_some_and(|lease| lease.id == lease_id)
    }

    /// Leave `Active` for `state`, returning the lease that was held.
    pub fn end(&mut self, state: LeaseState) -> Option<Lease> {
        self.set_state(state);
        self.lease.take()
    }
}
