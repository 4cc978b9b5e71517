//! Sleep/resume detection configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Power-state monitoring configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerConfig {
    /// Whether the built-in clock-drift detector is used when the host does
    /// not supply its own power monitor.
    #[serde(default = "default_true")]
    pub detect_sleep: bool,
    /// How often the detector samples the clocks, in seconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
    /// Wall-clock time that must go missing from the monotonic clock before
    /// a suspend is assumed, in seconds.
    #[serde(default = "default_drift_threshold")]
    pub drift_threshold_seconds: u64,
}

impl PowerConfig {
    /// Sampling interval for the detector.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds.max(1))
    }

    /// Drift threshold for the detector.
    pub fn drift_threshold(&self) -> Duration {
        Duration::from_secs(self.drift_threshold_seconds)
    }
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            detect_sleep: true,
            poll_interval_seconds: default_poll_interval(),
            drift_threshold_seconds: default_drift_threshold(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_poll_interval() -> u64 {
    5
}

fn default_drift_threshold() -> u64 {
    30
}
