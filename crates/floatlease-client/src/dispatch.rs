//! Delivery of lease status events to the host callback.
//!
//! Events are queued in the order their state transitions happened and
//! delivered by a single task, so the handler is never invoked
//! concurrently with itself. The session enqueues while it holds its state
//! lock and waits for delivery after releasing it, which lets the handler
//! call back into the client.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use floatlease_core::types::CallbackEvent;

/// Host handler for lease status events.
#[async_trait]
pub trait LeaseCallback: Send + Sync + 'static {
    /// Handle one event. The next event is not delivered until this returns.
    async fn on_event(&self, event: CallbackEvent);
}

#[async_trait]
impl<F> LeaseCallback for F
where
    F: Fn(CallbackEvent) + Send + Sync + 'static,
{
    async fn on_event(&self, event: CallbackEvent) {
        (self)(event)
    }
}

tokio::task_local! {
    static IN_DISPATCH: ();
}

/// Whether the current task is the dispatcher running a host handler.
pub(crate) fn in_dispatch() -> bool {
    IN_DISPATCH.try_with(|_| ()).is_ok()
}

struct Envelope {
    event: CallbackEvent,
    delivered: oneshot::Sender<()>,
}

/// Resolves once the handler has returned for a queued event.
#[must_use = "await `delivered` to keep the session in step with the handler"]
pub(crate) struct DispatchTicket(Option<oneshot::Receiver<()>>);

impl DispatchTicket {
    /// A ticket that is already complete.
    pub(crate) fn none() -> Self {
        Self(None)
    }

    /// Wait until the handler has returned. Returns immediately if the
    /// dispatcher has shut down.
    pub(crate) async fn delivered(self) {
        if let Some(rx) = self.0 {
            let _ = rx.await;
        }
    }
}

/// Single-consumer event queue in front of the host callback.
pub(crate) struct CallbackDispatcher {
    tx: Mutex<Option<mpsc::UnboundedSender<Envelope>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl CallbackDispatcher {
    /// Start the dispatcher task for a handler.
    pub(crate) fn spawn(handler: Arc<dyn LeaseCallback>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(handler, rx));
        Self {
            tx: Mutex::new(Some(tx)),
            task: Mutex::new(Some(task)),
        }
    }

    /// Queue an event behind any earlier ones.
    pub(crate) fn enqueue(&self, event: CallbackEvent) -> DispatchTicket {
        let tx = self.tx.lock().unwrap_or_else(|e| e.into_inner());
        let Some(tx) = tx.as_ref() else {
            tracing::warn!(%event, "Dispatcher closed; dropping lease event");
            return DispatchTicket::none();
        };

        let (delivered, rx) = oneshot::channel();
        if tx.send(Envelope { event, delivered }).is_err() {
            tracing::warn!(%event, "Dispatcher task gone; dropping lease event");
            return DispatchTicket::none();
        }
        tracing::debug!(%event, "Lease event queued");
        DispatchTicket(Some(rx))
    }

    /// Stop accepting events, deliver what is queued, and wait for the
    /// dispatcher task to finish. When called from inside the handler the
    /// task is left to drain on its own.
    pub(crate) async fn shutdown(&self) {
        self.tx.lock().unwrap_or_else(|e| e.into_inner()).take();

        let task = self.task.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(task) = task {
            if in_dispatch() {
                return;
            }
            if let Err(e) = task.await {
                tracing::error!("Dispatcher task failed: {}", e);
            }
        }
    }
}

impl Drop for CallbackDispatcher {
    fn drop(&mut self) {
        let task = self.task.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(task) = task {
            task.abort();
        }
    }
}

async fn run(handler: Arc<dyn LeaseCallback>, mut rx: mpsc::UnboundedReceiver<Envelope>) {
    while let Some(Envelope { event, delivered }) = rx.recv().await {
        tracing::debug!(%event, "Delivering lease event");
        let outcome = IN_DISPATCH
            .scope((), AssertUnwindSafe(handler.on_event(event)).catch_unwind())
            .await;
        if outcome.is_err() {
            tracing::error!(%event, "Lease callback panicked");
        }
        let _ = delivered.send(());
    }
    tracing::debug!("Dispatcher stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    struct Recorder {
        events: Mutex<Vec<CallbackEvent>>,
        in_flight: AtomicUsize,
        overlap: AtomicUsize,
    }

    #[async_trait]
    impl LeaseCallback for Recorder {
        async fn on_event(&self, event: CallbackEvent) {
            if self.in_flight.fetch_add(1, Ordering::SeqCst) > 0 {
                self.overlap.fetch_add(1, Ordering::SeqCst);
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.events.lock().unwrap().push(event);
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_events_delivered_in_order_one_at_a_time() {
        let recorder = Arc::new(Recorder {
            events: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            overlap: AtomicUsize::new(0),
        });
        let dispatcher = CallbackDispatcher::spawn(recorder.clone());

        let sent = [
            CallbackEvent::FeaturesChanged,
            CallbackEvent::LeaseDroppedSleep,
            CallbackEvent::LeaseRegained,
            CallbackEvent::ExpiredInet,
        ];
        let tickets: Vec<_> = sent.iter().map(|e| dispatcher.enqueue(*e)).collect();
        for ticket in tickets {
            ticket.delivered().await;
        }

        assert_eq!(*recorder.events.lock().unwrap(), sent.to_vec());
        assert_eq!(recorder.overlap.load(Ordering::SeqCst), 0);
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_panicking_handler_does_not_stop_dispatch() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let dispatcher = CallbackDispatcher::spawn(Arc::new(move |event: CallbackEvent| {
            if event == CallbackEvent::Expired {
                panic!("handler bug");
            }
            sink.lock().unwrap().push(event);
        }));

        dispatcher.enqueue(CallbackEvent::Expired).delivered().await;
        dispatcher
            .enqueue(CallbackEvent::LeaseDropped)
            .delivered()
            .await;

        assert_eq!(*seen.lock().unwrap(), vec![CallbackEvent::LeaseDropped]);
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_enqueue_after_shutdown_is_dropped() {
        let dispatcher = CallbackDispatcher::spawn(Arc::new(|_: CallbackEvent| {}));
        dispatcher.shutdown().await;
        // Completes immediately instead of hanging.
        dispatcher.enqueue(CallbackEvent::Expired).delivered().await;
    }

    #[tokio::test]
    async fn test_shutdown_drains_queue() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let dispatcher = CallbackDispatcher::spawn(Arc::new(move |event: CallbackEvent| {
            sink.lock().unwrap().push(event);
        }));

        let _ = dispatcher.enqueue(CallbackEvent::FeaturesChanged);
        let _ = dispatcher.enqueue(CallbackEvent::LeaseDropped);
        dispatcher.shutdown().await;

        assert_eq!(seen.lock().unwrap().len(), 2);
    }
}
