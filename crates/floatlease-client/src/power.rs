//! Sleep/resume signals.
//!
//! Suspend detection is platform specific, so the session only consumes a
//! [`PowerMonitor`]. Hosts that receive OS power notifications forward them
//! through a [`PowerSignal`]; otherwise [`ClockDriftMonitor`] infers a
//! suspend after the fact from wall-clock time that the monotonic clock
//! did not see.

use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use floatlease_core::config::power::PowerConfig;

/// A machine power transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PowerEvent {
    /// The machine is going to sleep or hibernate.
    Suspend,
    /// The machine woke up.
    Resume,
}

/// Source of power transitions.
pub trait PowerMonitor: Send + Sync + 'static {
    /// Receive every transition from now on.
    fn subscribe(&self) -> broadcast::Receiver<PowerEvent>;
}

/// Manually driven power signal.
#[derive(Debug, Clone)]
pub struct PowerSignal {
    tx: broadcast::Sender<PowerEvent>,
}

impl PowerSignal {
    /// Create a signal with no subscribers.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx }
    }

    /// Broadcast a transition. Returns the number of subscribers reached.
    pub fn notify(&self, event: PowerEvent) -> usize {
        tracing::debug!(?event, "Power transition");
        self.tx.send(event).unwrap_or(0)
    }

    /// Broadcast [`PowerEvent::Suspend`].
    pub fn suspend(&self) -> usize {
        self.notify(PowerEvent::Suspend)
    }

    /// Broadcast [`PowerEvent::Resume`].
    pub fn resume(&self) -> usize {
        self.notify(PowerEvent::Resume)
    }
}

impl Default for PowerSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl PowerMonitor for PowerSignal {
    fn subscribe(&self) -> broadcast::Receiver<PowerEvent> {
        self.tx.subscribe()
    }
}

/// Detects suspends by comparing wall-clock and monotonic elapsed time.
///
/// The monotonic clock stops while the machine sleeps; the wall clock does
/// not. When the wall clock moved further than the monotonic clock by more
/// than the threshold between two samples, a `Suspend` followed by a
/// `Resume` is emitted.
#[derive(Debug)]
pub struct ClockDriftMonitor {
    signal: PowerSignal,
    poll_interval: Duration,
    threshold: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ClockDriftMonitor {
    /// Create a detector. Sampling starts on the first subscription.
    pub fn new(config: &PowerConfig) -> Self {
        Self {
            signal: PowerSignal::new(),
            poll_interval: config.poll_interval(),
            threshold: config.drift_threshold(),
            task: Mutex::new(None),
        }
    }

    fn ensure_started(&self) {
        let mut task = self.task.lock().unwrap_or_else(|e| e.into_inner());
        if task.is_none() {
            tracing::debug!(
                poll = ?self.poll_interval,
                threshold = ?self.threshold,
                "Starting clock drift sleep detector"
            );
            *task = Some(tokio::spawn(sample(
                self.signal.clone(),
                self.poll_interval,
                self.threshold,
            )));
        }
    }
}

impl PowerMonitor for ClockDriftMonitor {
    fn subscribe(&self) -> broadcast::Receiver<PowerEvent> {
        let rx = self.signal.subscribe();
        self.ensure_started();
        rx
    }
}

impl Drop for ClockDriftMonitor {
    fn drop(&mut self) {
        if let Some(task) = self.task.lock().unwrap_or_else(|e| e.into_inner()).take() {
            task.abort();
        }
    }
}

async fn sample(signal: PowerSignal, poll_interval: Duration, threshold: Duration) {
    let mut interval = time::interval(poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut last_mono = Instant::now();
    let mut last_wall = SystemTime::now();

    loop {
        interval.tick().await;
        let mono = Instant::now();
        let wall = SystemTime::now();

        let mono_elapsed = mono.duration_since(last_mono);
        let wall_elapsed = wall.duration_since(last_wall).unwrap_or_default();

        if let Some(asleep) = missing_time(mono_elapsed, wall_elapsed, threshold) {
            tracing::info!(asleep = ?asleep, "Detected system sleep");
            signal.suspend();
            signal.resume();
        }

        last_mono = mono;
        last_wall = wall;
    }
}

/// Wall-clock time unaccounted for by the monotonic clock, if it exceeds
/// the threshold.
fn missing_time(mono_elapsed: Duration, wall_elapsed: Duration, threshold: Duration) -> Option<Duration> {
    let missing = wall_elapsed.checked_sub(mono_elapsed)?;
    (missing > threshold).then_some(missing)
}
