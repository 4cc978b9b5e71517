//! Server registry storage configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where saved server locations live on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Directory for per-user settings.
    #[serde(default = "default_user_dir")]
    pub user_dir: String,
    /// Directory for machine-wide settings.
    #[serde(default = "default_system_dir")]
    pub system_dir: String,
}

impl RegistryConfig {
    /// Per-user store directory.
    pub fn user_path(&self) -> PathBuf {
        PathBuf::from(&self.user_dir)
    }

    /// Machine-wide store directory.
    pub fn system_path(&self) -> PathBuf {
        PathBuf::from(&self.system_dir)
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            user_dir: default_user_dir(),
            system_dir: default_system_dir(),
        }
    }
}

fn default_user_dir() -> String {
    let base = if cfg!(windows) {
        std::env::var("APPDATA").ok().map(PathBuf::from)
    } else {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| std::env::var("HOME").ok().map(|h| PathBuf::from(h).join(".config")))
    };

    base.unwrap_or_else(|| PathBuf::from("."))
        .join("floatlease")
        .to_string_lossy()
        .into_owned()
}

fn default_system_dir() -> String {
    if cfg!(windows) {
        "C:\\ProgramData\\floatlease".to_string()
    } else {
        "/etc/floatlease".to_string()
    }
}
