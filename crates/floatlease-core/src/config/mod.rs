//! Client configuration schemas.
//!
//! All configuration structs are deserialized from an optional TOML file
//! and `FLOATLEASE_`-prefixed environment variables via the `config`
//! crate. Every field has a default, so an empty source yields a usable
//! configuration.

pub mod lease;
pub mod logging;
pub mod power;
pub mod registry;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use self::lease::LeaseConfig;
use self::logging::LoggingConfig;
use self::power::PowerConfig;
use self::registry::RegistryConfig;

use crate::error::LeaseError;

/// Root client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Lease request and renewal settings.
    #[serde(default)]
    pub lease: LeaseConfig,
    /// Server registry storage settings.
    #[serde(default)]
    pub registry: RegistryConfig,
    /// Sleep/resume detection settings.
    #[serde(default)]
    pub power: PowerConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ClientConfig {
    /// Load configuration from an optional TOML file merged with
    /// environment variables prefixed with `FLOATLEASE`.
    ///
    /// Nested keys use a double underscore, e.g.
    /// `FLOATLEASE_LEASE__REQUEST_TIMEOUT_SECONDS=10`.
    pub fn load(path: Option<&str>) -> Result<Self, LeaseError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix("FLOATLEASE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| {
                warn!(path = ?path, "Failed to build client configuration: {}", e);
                LeaseError::fail(format!("failed to build config: {e}"))
            })?;

        let loaded: Self = config.try_deserialize().map_err(|e| {
            warn!(path = ?path, "Failed to deserialize client configuration: {}", e);
            LeaseError::fail(format!("failed to deserialize config: {e}"))
        })?;

        debug!(
            path = ?path,
            request_timeout_seconds = loaded.lease.request_timeout_seconds,
            detect_sleep = loaded.power.detect_sleep,
            "Client configuration loaded"
        );
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.lease.request_timeout_seconds, 30);
        assert_eq!(config.lease.max_clock_skew_seconds, 300);
        assert_eq!(config.lease.renew_at_percent, 50);
        assert!(config.power.detect_sleep);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            r#"
[lease]
request_timeout_seconds = 5
renew_at_percent = 75

[power]
detect_sleep = false

[registry]
user_dir = "/tmp/floatlease-user"
"#
        )
        .unwrap();

        let config = ClientConfig::load(file.path().to_str()).unwrap();
        assert_eq!(config.lease.request_timeout_seconds, 5);
        assert_eq!(config.lease.renew_at_percent, 75);
        assert_eq!(config.lease.max_clock_skew_seconds, 300);
        assert!(!config.power.detect_sleep);
        assert_eq!(config.registry.user_dir, "/tmp/floatlease-user");
    }

    #[test]
    fn test_malformed_file_is_fail() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(file, "[lease]\nrequest_timeout_seconds = \"soon\"").unwrap();

        let err = ClientConfig::load(file.path().to_str()).unwrap_err();
        assert!(matches!(err, LeaseError::Fail(_)), "{err:?}");
        assert!(err.to_string().contains("failed to deserialize config"));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = ClientConfig::load(Some("/nonexistent/floatlease")).unwrap();
        assert_eq!(config.lease.request_timeout_seconds, 30);
    }
}
