//! Lease status notifications delivered to the host callback.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A lease status change reported to the host application.
///
/// Every event except [`CallbackEvent::FeaturesChanged`] and
/// [`CallbackEvent::LeaseRegained`] means the host no longer holds a seat
/// and must stop privileged functionality. It should let the user save
/// their work and offer a retry rather than exit abruptly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackEvent {
    /// The lease expired and could not be renewed.
    Expired,
    /// The lease expired because the server could not be reached.
    ExpiredInet,
    /// The lease was renewed and some feature values changed.
    FeaturesChanged,
    /// The server dropped the lease.
    LeaseDropped,
    /// The lease was dropped because the machine went to sleep. One
    /// automatic re-request follows on resume.
    LeaseDroppedSleep,
    /// The lease was regained after a sleep drop.
    LeaseRegained,
}

impl CallbackEvent {
    /// Numeric status passed to native-style callbacks.
    pub fn code(self) -> u32 {
        match self {
            Self::Expired => 0x00,
            Self::ExpiredInet => 0x01,
            Self::FeaturesChanged => 0x02,
            Self::LeaseDropped => 0x03,
            Self::LeaseDroppedSleep => 0x04,
            Self::LeaseRegained => 0x05,
        }
    }

    /// Parse a numeric callback status.
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0x00 => Some(Self::Expired),
            0x01 => Some(Self::ExpiredInet),
            0x02 => Some(Self::FeaturesChanged),
            0x03 => Some(Self::LeaseDropped),
            0x04 => Some(Self::LeaseDroppedSleep),
            0x05 => Some(Self::LeaseRegained),
            _ => None,
        }
    }

    /// Whether this event means the seat is gone.
    pub fn ends_lease(self) -> bool {
        !matches!(self, Self::FeaturesChanged | Self::LeaseRegained)
    }
}

impl fmt::Display for CallbackEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expired => write!(f, "expired"),
            Self::ExpiredInet => write!(f, "expired_inet"),
            Self::FeaturesChanged => write!(f, "features_changed"),
            Self::LeaseDropped => write!(f, "lease_dropped"),
            Self::LeaseDroppedSleep => write!(f, "lease_dropped_sleep"),
            Self::LeaseRegained => write!(f, "lease_regained"),
        }
    }
}
