//! Timer-driven lease renewal.

use std::sync::Weak;
use std::time::Duration;

use tokio::time;
use tracing::{debug, info, warn};

use floatlease_core::error::LeaseError;
use floatlease_core::types::{CallbackEvent, LeaseState};

use crate::dispatch::DispatchTicket;
use crate::transport::RenewOutcome;

use super::LeaseSession;

/// Renew `lease_id` until it ends. The first renewal fires after `delay`.
pub(super) async fn run(session: Weak<LeaseSession>, lease_id: String, mut delay: Duration) {
    loop {
        time::sleep(delay).await;

        let Some(session) = session.upgrade() else {
            return;
        };
        match session.renew_once(&lease_id).await {
            Some(next) => delay = next,
            None => return,
        }
    }
}

impl LeaseSession {
    /// One renewal attempt. Returns the delay before the next one, or
    /// `None` once the lease has ended.
    async fn renew_once(&self, lease_id: &str) -> Option<Duration> {
        let config = &self.ctx.config().lease;
        let mut inner = self.inner.lock().await;
        if !inner.holds(lease_id) {
            return None;
        }
        let lease = inner.lease.as_ref()?.clone();

        let call = self.ctx.transport_context(&lease.endpoint);
        let result = match time::timeout(
            config.request_timeout(),
            self.ctx.transport().renew(&call, lease_id),
        )
        .await
        {
            Ok(result) => result,
            Err(elapsed) => Err(LeaseError::from(elapsed)),
        };

        let (event, next) = match result {
            Ok(RenewOutcome::Renewed(renewal)) => {
                inner.clock.anchor(renewal.server_time);
                if let Some(lease) = inner.lease.as_mut() {
                    lease.extend(renewal.lease_duration);
                }
                let changed = renewal.features.map(|features| {
                    self.features.replace(features);
                    CallbackEvent::FeaturesChanged
                });
                let next = config.renew_after(renewal.lease_duration);
                debug!(lease_id, next = ?next, features_changed = changed.is_some(), "Lease renewed");
                (changed, Some(next))
            }
            Ok(RenewOutcome::Revoked) => {
                inner.end(LeaseState::None);
                self.features.clear();
                info!(lease_id, "Lease revoked by the server");
                (Some(CallbackEvent::LeaseDropped), None)
            }
            Err(e) if e.is_transport() && config.renew_retry() < lease.remaining() => {
                warn!(
                    lease_id,
                    error = %e,
                    retry_in = ?config.renew_retry(),
                    remaining = ?lease.remaining(),
                    "Lease renewal failed; retrying"
                );
                (None, Some(config.renew_retry()))
            }
            Err(e) => {
                let event = if e.is_transport() {
                    CallbackEvent::ExpiredInet
                } else {
                    CallbackEvent::Expired
                };
                inner.end(LeaseState::Expired);
                self.features.clear();
                warn!(lease_id, error = %e, %event, "Lease expired");
                (Some(event), None)
            }
        };

        let ticket = event.map_or_else(DispatchTicket::none, |event| self.notify(event));
        if next.is_none() {
            // Detach this task; nothing should wait on it any more.
            inner.renewal.take();
        }
        drop(inner);

        ticket.delivered().await;
        next
    }
}
