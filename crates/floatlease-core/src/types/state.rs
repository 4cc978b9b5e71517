//! Lease lifecycle states.

use std::fmt;

use serde::{Deserialize, Serialize};

/// State of the single lease owned by a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaseState {
    /// No lease has been requested, or it was dropped or revoked.
    #[default]
    None,
    /// A lease is held and being renewed.
    Active,
    /// The lease was released because the machine went to sleep.
    DroppedSleep,
    /// The lease could not be renewed or regained.
    Expired,
}

impl LeaseState {
    /// Whether a seat is currently held.
    pub fn is_active(self) -> bool {
        self == Self::Active
    }
}

impl fmt::Display for LeaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Active => write!(f, "active"),
            Self::DroppedSleep => write!(f, "dropped_sleep"),
            Self::Expired => write!(f, "expired"),
        }
    }
}
