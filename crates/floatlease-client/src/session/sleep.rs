//! Sleep and resume handling.
//!
//! A lease held when the machine suspends is released, since renewals
//! cannot run while asleep. On resume exactly one attempt is made to get
//! it back.

use std::sync::{Arc, Weak};

use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};

use floatlease_core::types::{CallbackEvent, LeaseState};

use crate::power::PowerEvent;

use super::LeaseSession;

/// Forward power transitions to the session until it goes away.
pub(super) async fn watch(session: Weak<LeaseSession>, mut rx: broadcast::Receiver<PowerEvent>) {
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(missed)) => {
                warn!(missed, "Missed power transitions");
                continue;
            }
            Err(RecvError::Closed) => return,
        };

        let Some(session) = session.upgrade() else {
            return;
        };
        match event {
            PowerEvent::Suspend => session.on_suspend().await,
            PowerEvent::Resume => session.on_resume().await,
        }
    }
}

impl LeaseSession {
    async fn on_suspend(&self) {
        let mut inner = self.inner.lock().await;
        if inner.is_closed() || inner.state() != LeaseState::Active {
            return;
        }

        self.stop_renewal(&mut inner).await;
        let held = inner.end(LeaseState::DroppedSleep);
        self.features.clear();
        if let Some(lease) = &held {
            self.release_quietly(lease).await;
        }
        info!(product = %self.product.guid, "Lease dropped for system sleep");

        let ticket = self.notify(CallbackEvent::LeaseDroppedSleep);
        drop(inner);
        ticket.delivered().await;
    }

    async fn on_resume(self: Arc<Self>) {
        let mut inner = self.inner.lock().await;
        if inner.is_closed() || inner.state() != LeaseState::DroppedSleep {
            return;
        }

        let endpoint = match self.ctx.registry().get(&self.product.guid).await {
            Ok(Some(endpoint)) => endpoint,
            Ok(None) => {
                warn!(product = %self.product.guid, "No lease server configured; lease not regained");
                inner.set_state(LeaseState::Expired);
                return;
            }
            Err(e) => {
                warn!(product = %self.product.guid, error = %e, "Lease not regained");
                inner.set_state(LeaseState::Expired);
                return;
            }
        };

        match self.acquire(&endpoint).await {
            Ok(grant) => {
                self.activate(&mut inner, endpoint, grant);
                info!(product = %self.product.guid, "Lease regained after resume");
                let ticket = self.notify(CallbackEvent::LeaseRegained);
                drop(inner);
                ticket.delivered().await;
            }
            Err(e) => {
                warn!(product = %self.product.guid, error = %e, "Lease not regained after resume");
                inner.set_state(LeaseState::Expired);
            }
        }
    }
}
