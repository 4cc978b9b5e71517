//! Convenience result type alias for FloatLease.

use crate::error::LeaseError;

/// A specialized `Result` type for lease operations.
pub type LeaseResult<T> = Result<T, LeaseError>;
