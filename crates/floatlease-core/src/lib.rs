//! # floatlease-core
//!
//! Core crate for FloatLease. Contains the lease error taxonomy and
//! status-code classifier, configuration schemas, the shared domain types
//! (server endpoints, lease states, callback events, handles), and the
//! tracing bootstrap.
//!
//! This crate has **no** internal dependencies on other FloatLease crates.

pub mod config;
pub mod error;
pub mod logging;
pub mod result;
pub mod types;

pub use error::LeaseError;
pub use result::LeaseResult;
