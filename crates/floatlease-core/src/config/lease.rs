//! Lease request and renewal configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Lease lifecycle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaseConfig {
    /// Upper bound for a single grant or renew call, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// Upper bound for a best-effort release call, in seconds.
    #[serde(default = "default_release_timeout")]
    pub release_timeout_seconds: u64,
    /// Point in the lease period at which renewal fires, as a percentage.
    #[serde(default = "default_renew_at_percent")]
    pub renew_at_percent: u8,
    /// Delay before retrying a renewal that failed on the network, in
    /// seconds. Retries stop once the lease would expire first.
    #[serde(default = "default_renew_retry")]
    pub renew_retry_seconds: u64,
    /// Maximum tolerated difference between local and server clocks.
    #[serde(default = "default_max_clock_skew")]
    pub max_clock_skew_seconds: u64,
    /// Username reported to the server. Defaults to the OS user.
    #[serde(default)]
    pub username: Option<String>,
}

impl LeaseConfig {
    /// Timeout applied to grant and renew calls.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Timeout applied to release calls.
    pub fn release_timeout(&self) -> Duration {
        Duration::from_secs(self.release_timeout_seconds)
    }

    /// Delay between network renewal retries.
    pub fn renew_retry(&self) -> Duration {
        Duration::from_secs(self.renew_retry_seconds)
    }

    /// Maximum tolerated clock skew.
    pub fn max_clock_skew(&self) -> Duration {
        Duration::from_secs(self.max_clock_skew_seconds)
    }

    /// Delay after a grant or renewal before the next renewal fires.
    ///
    /// `lease_duration` comes from the server and may be arbitrarily large.
    pub fn renew_after(&self, lease_duration: Duration) -> Duration {
        let percent = u32::from(self.renew_at_percent.clamp(1, 99));
        let delay = match lease_duration.checked_mul(percent) {
            Some(scaled) => scaled / 100,
            None => lease_duration / 100 * percent,
        };
        delay.max(Duration::from_secs(1))
    }

    /// The username to present to the server.
    pub fn effective_username(&self) -> String {
        self.username
            .clone()
            .or_else(|| std::env::var("USER").ok())
            .or_else(|| std::env::var("USERNAME").ok())
            .unwrap_or_default()
    }
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            request_timeout_seconds: default_request_timeout(),
            release_timeout_seconds: default_release_timeout(),
            renew_at_percent: default_renew_at_percent(),
            renew_retry_seconds: default_renew_retry(),
            max_clock_skew_seconds: default_max_clock_skew(),
            username: None,
        }
    }
}

fn default_request_timeout() -> u64 {
    30
}

fn default_release_timeout() -> u64 {
    10
}

fn default_renew_at_percent() -> u8 {
    50
}

fn default_renew_retry() -> u64 {
    30
}

fn default_max_clock_skew() -> u64 {
    300
}
