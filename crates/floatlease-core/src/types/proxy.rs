//! Custom proxy settings for TLS traffic.

use std::fmt;

use crate::error::LeaseError;

/// Port used when a proxy address omits one.
pub const DEFAULT_PROXY_PORT: u16 = 1080;

/// A parsed proxy address of the form `http://[user:pass@]host[:port]/`.
#[derive(Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Proxy host name or address.
    pub host: String,
    /// Proxy port.
    pub port: u16,
    /// Optional user name.
    pub username: Option<String>,
    /// Optional password.
    pub password: Option<String>,
}

impl ProxyConfig {
    /// Parse a proxy URI.
    pub fn parse(uri: &str) -> Result<Self, LeaseError> {
        let invalid = || LeaseError::fail(format!("invalid proxy address '{uri}'"));

        let rest = uri
            .trim()
            .strip_prefix("http://")
            .ok_or_else(invalid)?;
        let authority = rest.split('/').next().unwrap_or_default();

        let (credentials, hostport) = match authority.rsplit_once('@') {
            Some((creds, hostport)) => (Some(creds), hostport),
            None => (None, authority),
        };

        let (username, password) = match credentials {
            Some(creds) => match creds.split_once(':') {
                Some((user, pass)) => (Some(user.to_string()), Some(pass.to_string())),
                None => (Some(creds.to_string()), None),
            },
            None => (None, None),
        };

        let (host, port) = if hostport.starts_with('[') {
            let (addr, tail) = hostport.split_once(']').ok_or_else(invalid)?;
            let host = &hostport[..=addr.len()];
            match tail.strip_prefix(':') {
                Some(port) => (host, port.parse::<u16>().map_err(|_| invalid())?),
                None if tail.is_empty() => (host, DEFAULT_PROXY_PORT),
                None => return Err(invalid()),
            }
        } else {
            match hostport.rsplit_once(':') {
                Some((host, port)) => (host, port.parse::<u16>().map_err(|_| invalid())?),
                None => (hostport, DEFAULT_PROXY_PORT),
            }
        };

        if host.is_empty() || port == 0 {
            return Err(invalid());
        }

        Ok(Self {
            host: host.to_string(),
            port,
            username,
            password,
        })
    }
}

impl fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

impl fmt::Display for ProxyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.username {
            Some(user) => write!(f, "http://{user}@{}:{}/", self.host, self.port),
            None => write!(f, "http://{}:{}/", self.host, self.port),
        }
    }
}
