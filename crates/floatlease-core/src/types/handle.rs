//! Opaque lease handle.

use std::fmt;
use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};

/// Identifier of an open lease client.
///
/// A handle is never zero; a product that fails to resolve never gets one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LeaseHandle(NonZeroU32);

impl LeaseHandle {
    /// Wrap a raw handle value. Returns `None` for zero.
    pub fn new(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    /// The raw handle value.
    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for LeaseHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handle#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_is_not_a_handle() {
        assert!(LeaseHandle::new(0).is_none());
        assert_eq!(LeaseHandle::new(7).map(LeaseHandle::get), Some(7));
        assert_eq!(LeaseHandle::new(3).unwrap().to_string(), "handle#3");
    }
}
