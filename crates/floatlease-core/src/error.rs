//! Lease error taxonomy and status-code classification.
//!
//! Every outcome reported by the lease server, the transport, or the local
//! environment maps to exactly one [`LeaseError`] variant. Status codes this
//! library does not recognize are preserved in [`LeaseError::Unknown`] so a
//! newer server degrades into a reportable error.

use std::borrow::Cow;
use std::fmt;

use thiserror::Error;

/// Numeric status codes exchanged with the lease server.
pub mod code {
    /// Success.
    pub const OK: u32 = 0x00;
    /// Generic failure.
    pub const FAIL: u32 = 0x01;
    /// No server location has been saved.
    pub const SERVER: u32 = 0x02;
    /// No lease callback was registered.
    pub const NO_CALLBACK: u32 = 0x03;
    /// Connection to the server failed.
    pub const INET: u32 = 0x04;
    /// The server has no free leases.
    pub const NO_FREE_LEASES: u32 = 0x05;
    /// A lease is already held.
    pub const LEASE_EXISTS: u32 = 0x06;
    /// Client and server clocks disagree.
    pub const WRONG_TIME: u32 = 0x07;
    /// The product descriptor failed to load.
    pub const DAT_FILE: u32 = 0x08;
    /// The handle is not valid.
    pub const INVALID_HANDLE: u32 = 0x09;
    /// There is no lease.
    pub const NO_LEASE: u32 = 0x0A;
    /// COM setup error (Windows).
    pub const COM: u32 = 0x0B;
    /// Insufficient system permission.
    pub const PERMISSION: u32 = 0x0D;
    /// Invalid or missing flags.
    pub const FLAGS: u32 = 0x0E;
    /// The server cannot lease this product version.
    pub const WRONG_SERVER_PRODUCT: u32 = 0x0F;
    /// The connection timed out.
    pub const INET_TIMEOUT: u32 = 0x10;
    /// The server requires a newer client library.
    pub const UPGRADE_LIBRARY: u32 = 0x11;
    /// The user is not on the server's username whitelist.
    pub const USERNAME_NOT_ALLOWED: u32 = 0x12;
    /// The saved host address is malformed.
    pub const BAD_HOST_ADDRESS: u32 = 0x13;
    /// Interprocess coordination failed.
    pub const CLIENT_IPC: u32 = 0x14;
    /// The hosted-server selector does not match the server.
    pub const SERVER_UUID_MISMATCH: u32 = 0x1B;
    /// Disabled network adapters prevent reading hardware properties.
    pub const ENABLE_NETWORK_ADAPTERS: u32 = 0x1C;
    /// The WMI repository is broken (Windows).
    pub const BROKEN_WMI: u32 = 0x22;
    /// TLS or certificate failure.
    pub const INET_TLS: u32 = 0x24;
}

/// Broad grouping of lease errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorCategory {
    /// Network and transport failures.
    Transport,
    /// Protocol or configuration mismatches with the server.
    Protocol,
    /// Misuse of the lease lifecycle.
    LeaseState,
    /// Local machine or environment problems.
    Environment,
    /// Generic or unrecognized failures.
    Generic,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport => write!(f, "TRANSPORT"),
            Self::Protocol => write!(f, "PROTOCOL"),
            Self::LeaseState => write!(f, "LEASE_STATE"),
            Self::Environment => write!(f, "ENVIRONMENT"),
            Self::Generic => write!(f, "GENERIC"),
        }
    }
}

/// How a host application is expected to react to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Disposition {
    /// Transient network problem. Offer the user a retry, back off between
    /// attempts, and do not loop forever on its own.
    RetryWithBackoff,
    /// The seat pool is exhausted. Retry later or free a seat elsewhere.
    RetryLater,
    /// The local or server clock must be corrected before retrying.
    FixClock,
    /// The server settings are wrong. Prompt for a different server.
    Reconfigure,
    /// The machine environment needs attention (permissions, adapters, WMI).
    FixEnvironment,
    /// The caller used the API out of order.
    CallerBug,
    /// Nothing the user can do from within the application.
    Unrecoverable,
}

/// The closed error taxonomy for lease operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LeaseError {
    /// Generic failure with a short detail.
    #[error("operation failed: {0}")]
    Fail(Cow<'static, str>),

    /// Connection to the lease server failed.
    #[error("connection to the lease server failed")]
    Inet,

    /// The connection timed out.
    #[error("connection to the lease server timed out")]
    InetTimeout,

    /// The secure connection failed due to a TLS or certificate error.
    #[error("secure connection to the lease server failed (TLS or certificate error)")]
    InetTls,

    /// No server location has been saved.
    #[error("no lease server is configured; save a server location first")]
    Server,

    /// The server cannot hand out leases for this product version.
    #[error("the lease server cannot grant leases for this product version")]
    WrongServerProduct,

    /// The `server` selector of the saved address does not match the server.
    #[error("the hosted server selector in the saved address does not match the server")]
    ServerUuidMismatch,

    /// The current user is not whitelisted on the server.
    #[error("the current username is not allowed to request leases from this server")]
    UsernameNotAllowed,

    /// The host address contains a protocol prefix, a port, or is malformed.
    #[error("the server host address is invalid (no protocol prefix or port allowed)")]
    BadHostAddress,

    /// The server requires a newer client library.
    #[error("this client library is too old to talk to the lease server")]
    UpgradeLibrary,

    /// No callback was registered before requesting a lease.
    #[error("no lease callback registered")]
    NoCallback,

    /// The server has no free leases in the pool.
    #[error("no free leases are available on the lease server")]
    NoFreeLeases,

    /// A lease is already held by this handle.
    #[error("a lease is already held")]
    LeaseExists,

    /// No lease is held.
    #[error("no lease is held")]
    NoLease,

    /// Client and server clocks differ by more than the allowed skew.
    #[error("local and server clocks differ by more than the allowed skew")]
    WrongTime,

    /// Insufficient privilege for the requested scope.
    #[error("insufficient permission; retry elevated or with user scope")]
    Permission,

    /// The handle is closed or was never valid.
    #[error("the lease handle is not valid")]
    InvalidHandle,

    /// The product descriptor failed to load or does not contain the product.
    #[error("the product descriptor failed to load or does not contain the product")]
    DatFile,

    /// Flags passed to an operation were invalid or missing.
    #[error("invalid or missing flags")]
    Flags,

    /// Interprocess coordination between client instances failed.
    #[error("interprocess communication between client instances failed")]
    ClientIpc,

    /// Disabled network adapters prevent reading hardware properties.
    #[error("enable the disabled network adapters and retry")]
    EnableNetworkAdapters,

    /// The WMI repository is broken.
    #[error("the WMI repository on this machine is broken")]
    BrokenWmi,

    /// COM setup error.
    #[error("COM setup error while reading hardware properties")]
    Com,

    /// A status code this library does not recognize.
    #[error("unrecognized lease status code {0:#010x}")]
    Unknown(u32),
}

impl LeaseError {
    /// Build a generic failure with a detail message.
    pub fn fail(detail: impl Into<Cow<'static, str>>) -> Self {
        Self::Fail(detail.into())
    }

    /// Classify a numeric status code. Returns `None` for [`code::OK`].
    pub fn from_code(status: u32) -> Option<Self> {
        let err = match status {
            code::OK => return None,
            code::FAIL => Self::fail("the lease server reported a failure"),
            code::SERVER => Self::Server,
            code::NO_CALLBACK => Self::NoCallback,
            code::INET => Self::Inet,
            code::NO_FREE_LEASES => Self::NoFreeLeases,
            code::LEASE_EXISTS => Self::LeaseExists,
            code::WRONG_TIME => Self::WrongTime,
            code::DAT_FILE => Self::DatFile,
            code::INVALID_HANDLE => Self::InvalidHandle,
            code::NO_LEASE => Self::NoLease,
            code::COM => Self::Com,
            code::PERMISSION => Self::Permission,
            code::FLAGS => Self::Flags,
            code::WRONG_SERVER_PRODUCT => Self::WrongServerProduct,
            code::INET_TIMEOUT => Self::InetTimeout,
            code::UPGRADE_LIBRARY => Self::UpgradeLibrary,
            code::USERNAME_NOT_ALLOWED => Self::UsernameNotAllowed,
            code::BAD_HOST_ADDRESS => Self::BadHostAddress,
            code::CLIENT_IPC => Self::ClientIpc,
            code::SERVER_UUID_MISMATCH => Self::ServerUuidMismatch,
            code::ENABLE_NETWORK_ADAPTERS => Self::EnableNetworkAdapters,
            code::BROKEN_WMI => Self::BrokenWmi,
            code::INET_TLS => Self::InetTls,
            other => Self::Unknown(other),
        };
        Some(err)
    }

    /// Turn a status code into a `Result`.
    pub fn check(status: u32) -> Result<(), Self> {
        match Self::from_code(status) {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }

    /// The numeric status code for this error.
    pub fn code(&self) -> u32 {
        match self {
            Self::Fail(_) => code::FAIL,
            Self::Inet => code::INET,
            Self::InetTimeout => code::INET_TIMEOUT,
            Self::InetTls => code::INET_TLS,
            Self::Server => code::SERVER,
            Self::WrongServerProduct => code::WRONG_SERVER_PRODUCT,
            Self::ServerUuidMismatch => code::SERVER_UUID_MISMATCH,
            Self::UsernameNotAllowed => code::USERNAME_NOT_ALLOWED,
            Self::BadHostAddress => code::BAD_HOST_ADDRESS,
            Self::UpgradeLibrary => code::UPGRADE_LIBRARY,
            Self::NoCallback => code::NO_CALLBACK,
            Self::NoFreeLeases => code::NO_FREE_LEASES,
            Self::LeaseExists => code::LEASE_EXISTS,
            Self::NoLease => code::NO_LEASE,
            Self::WrongTime => code::WRONG_TIME,
            Self::Permission => code::PERMISSION,
            Self::InvalidHandle => code::INVALID_HANDLE,
            Self::DatFile => code::DAT_FILE,
            Self::Flags => code::FLAGS,
            Self::ClientIpc => code::CLIENT_IPC,
            Self::EnableNetworkAdapters => code::ENABLE_NETWORK_ADAPTERS,
            Self::BrokenWmi => code::BROKEN_WMI,
            Self::Com => code::COM,
            Self::Unknown(code) => *code,
        }
    }

    /// The broad category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Inet | Self::InetTimeout | Self::InetTls => ErrorCategory::Transport,
            Self::Server
            | Self::WrongServerProduct
            | Self::ServerUuidMismatch
            | Self::UsernameNotAllowed
            | Self::BadHostAddress
            | Self::UpgradeLibrary => ErrorCategory::Protocol,
            Self::NoCallback
            | Self::NoFreeLeases
            | Self::LeaseExists
            | Self::NoLease
            | Self::WrongTime => ErrorCategory::LeaseState,
            Self::Permission
            | Self::InvalidHandle
            | Self::DatFile
            | Self::Flags
            | Self::ClientIpc
            | Self::EnableNetworkAdapters
            | Self::BrokenWmi
            | Self::Com => ErrorCategory::Environment,
            Self::Fail(_) | Self::Unknown(_) => ErrorCategory::Generic,
        }
    }

    /// The recommended host reaction to this error.
    pub fn disposition(&self) -> Disposition {
        match self {
            Self::Inet | Self::InetTimeout | Self::InetTls => Disposition::RetryWithBackoff,
            Self::NoFreeLeases => Disposition::RetryLater,
            Self::WrongTime => Disposition::FixClock,
            Self::Server
            | Self::WrongServerProduct
            | Self::ServerUuidMismatch
            | Self::UsernameNotAllowed
            | Self::BadHostAddress => Disposition::Reconfigure,
            Self::Permission
            | Self::DatFile
            | Self::ClientIpc
            | Self::EnableNetworkAdapters
            | Self::BrokenWmi
            | Self::Com => Disposition::FixEnvironment,
            Self::NoCallback
            | Self::LeaseExists
            | Self::NoLease
            | Self::InvalidHandle
            | Self::Flags => Disposition::CallerBug,
            Self::UpgradeLibrary | Self::Fail(_) | Self::Unknown(_) => Disposition::Unrecoverable,
        }
    }

    /// Whether retrying the same call may succeed without any change.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.disposition(),
            Disposition::RetryWithBackoff | Disposition::RetryLater
        )
    }

    /// Whether this is a network-level failure.
    pub fn is_transport(&self) -> bool {
        self.category() == ErrorCategory::Transport
    }
}

impl From<std::io::Error> for LeaseError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;

        match err.kind() {
            ErrorKind::TimedOut => Self::InetTimeout,
            ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::NotConnected
            | ErrorKind::AddrNotAvailable
            | ErrorKind::BrokenPipe => Self::Inet,
            ErrorKind::PermissionDenied => Self::Permission,
            _ => Self::fail(format!("I/O error: {err}")),
        }
    }
}

impl From<tokio::time::error::Elapsed> for LeaseError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        Self::InetTimeout
    }
}

impl From<serde_json::Error> for LeaseError {
    fn from(err: serde_json::Error) -> Self {
        Self::fail(format!("JSON serialization error: {err}"))
    }
}

impl From<config::ConfigError> for LeaseError {
    fn from(err: config::ConfigError) -> Self {
        Self::fail(format!("configuration error: {err}"))
    }
}
