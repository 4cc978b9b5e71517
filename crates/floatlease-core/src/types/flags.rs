//! Bit flags accepted by registry and date-check operations.

use bitflags::bitflags;

use crate::error::LeaseError;
use crate::types::endpoint::ServerScope;

bitflags! {
    /// Flags for saving a server location.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SaveFlags: u32 {
        /// Save machine-wide. Requires elevation unless previously unlocked.
        const SYSTEM = 0x0000_0001;
        /// Save for the current user only.
        const USER = 0x0000_0002;
        /// Talk to the server over TLS even on a port other than 443.
        const REQUEST_OVER_HTTPS = 0x0000_0004;
    }
}

impl SaveFlags {
    /// The storage scope selected by these flags.
    ///
    /// Exactly one of [`SaveFlags::SYSTEM`] and [`SaveFlags::USER`] must be set.
    pub fn scope(self) -> Result<ServerScope, LeaseError> {
        match (self.contains(Self::SYSTEM), self.contains(Self::USER)) {
            (true, false) => Ok(ServerScope::System),
            (false, true) => Ok(ServerScope::User),
            _ => Err(LeaseError::Flags),
        }
    }
}

bitflags! {
    /// Flags for date validation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DateCheckFlags: u32 {
        /// The date must not have passed.
        const HAS_NOT_EXPIRED = 0x0000_0001;
    }
}
