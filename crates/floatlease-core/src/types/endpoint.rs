//! Lease server endpoint and address validation.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LeaseError;
use crate::types::flags::SaveFlags;

/// Port that always implies TLS.
pub const HTTPS_PORT: u16 = 443;

/// Where a saved server location applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerScope {
    /// The current user only.
    User,
    /// Every user on the machine.
    System,
}

impl fmt::Display for ServerScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::System => write!(f, "system"),
        }
    }
}

/// A validated lease server location.
///
/// Port 443 always implies TLS, so a raw endpoint on 443 cannot be built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "EndpointRecord", into = "EndpointRecord")]
pub struct ServerEndpoint {
    host: String,
    port: u16,
    scope: ServerScope,
    use_tls: bool,
}

/// On-disk shape of a [`ServerEndpoint`]; re-validated on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EndpointRecord {
    host: String,
    port: u16,
    scope: ServerScope,
    #[serde(default)]
    use_tls: bool,
}

impl ServerEndpoint {
    /// Validate and build an endpoint from the arguments of a save call.
    pub fn new(host: &str, port: u16, flags: SaveFlags) -> Result<Self, LeaseError> {
        let scope = flags.scope()?;
        let use_tls = flags.contains(SaveFlags::REQUEST_OVER_HTTPS);
        Self::build(host, port, scope, use_tls)
    }

    fn build(host: &str, port: u16, scope: ServerScope, use_tls: bool) -> Result<Self, LeaseError> {
        validate_host(host)?;
        if port == 0 {
            return Err(LeaseError::BadHostAddress);
        }

        Ok(Self {
            host: host.trim().to_string(),
            port,
            scope,
            use_tls: use_tls || port == HTTPS_PORT,
        })
    }

    /// The host address, possibly with a path or query.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The server port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The scope the endpoint was saved under.
    pub fn scope(&self) -> ServerScope {
        self.scope
    }

    /// Whether traffic to this endpoint uses TLS.
    pub fn use_tls(&self) -> bool {
        self.use_tls
    }

    /// The host name without any path or query.
    pub fn authority(&self) -> &str {
        authority_of(&self.host)
    }

    /// The hosted-server selector (`?server=<uuid>`), if present.
    pub fn server_uuid(&self) -> Option<Uuid> {
        server_param(&self.host).and_then(|v| Uuid::parse_str(v).ok())
    }
}

impl fmt::Display for ServerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = if self.use_tls { "https" } else { "raw" };
        write!(f, "{scheme}:{}:{} ({})", self.authority(), self.port, self.scope)
    }
}

impl TryFrom<EndpointRecord> for ServerEndpoint {
    type Error = LeaseError;

    fn try_from(record: EndpointRecord) -> Result<Self, Self::Error> {
        Self::build(&record.host, record.port, record.scope, record.use_tls)
    }
}

impl From<ServerEndpoint> for EndpointRecord {
    fn from(endpoint: ServerEndpoint) -> Self {
        Self {
            host: endpoint.host,
            port: endpoint.port,
            scope: endpoint.scope,
            use_tls: endpoint.use_tls,
        }
    }
}

/// Check that a host address carries no protocol prefix and no port.
///
/// A path and query may follow the host (`floating.example.com/?server=<uuid>`).
/// IPv6 literals must be bracketed.
pub fn validate_host(host: &str) -> Result<(), LeaseError> {
    let host = host.trim();
    if host.is_empty() || host.contains("://") || host.chars().any(char::is_whitespace) {
        return Err(LeaseError::BadHostAddress);
    }

    let authority = authority_of(host);
    if authority.is_empty() {
        return Err(LeaseError::BadHostAddress);
    }

    if let Some(rest) = authority.strip_prefix('[') {
        match rest.split_once(']') {
            Some((addr, "")) if !addr.is_empty() => {}
            _ => return Err(LeaseError::BadHostAddress),
        }
    } else if authority.contains(':') || authority.contains('@') {
        return Err(LeaseError::BadHostAddress);
    }

    if let Some(selector) = server_param(host) {
        Uuid::parse_str(selector).map_err(|_| LeaseError::BadHostAddress)?;
    }

    Ok(())
}

fn authority_of(host: &str) -> &str {
    let end = host.find(['/', '?']).unwrap_or(host.len());
    &host[..end]
}

fn server_param(host: &str) -> Option<&str> {
    let (_, query) = host.split_once('?')?;
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "server")
        .map(|(_, value)| value)
}
