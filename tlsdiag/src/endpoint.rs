#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]

//! Network endpoints in `host:port` form.

use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// A remote or local transport endpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    /// Create an endpoint from a host and a non-zero port.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEndpoint`] if the host is empty or the port is 0.
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self, ConfigError> {
        let host = host.into();
        if host.is_empty() {
            return Err(ConfigError::InvalidEndpoint {
                input: format!(":{port}"),
                reason: "host is empty",
            });
        }
        if port == 0 {
            return Err(ConfigError::InvalidEndpoint {
                input: format!("{host}:0"),
                reason: "port must be in 1-65535",
            });
        }
        Ok(Self { host: strip_brackets(&host).to_string(), port })
    }

    /// A listen endpoint on `host` with an OS-assigned port.
    ///
    /// Only meaningful for binding; dialing it always fails.
    #[must_use]
    pub fn ephemeral(host: impl Into<String>) -> Self {
        let host = host.into();
        Self { host: strip_brackets(&host).to_string(), port: 0 }
    }

    /// Host name or IP literal, without IPv6 brackets
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port number
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }
}

fn strip_brackets(host: &str) -> &str {
    host.strip_prefix('[').and_then(|h| h.strip_suffix(']')).unwrap_or(host)
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for Endpoint {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason| ConfigError::InvalidEndpoint { input: s.to_string(), reason };

        let (host, port) = if let Some(rest) = s.strip_prefix('[') {
            let (host, tail) = rest.split_once(']').ok_or_else(|| invalid("unclosed '['"))?;
            let port = tail.strip_prefix(':').ok_or_else(|| invalid("missing port"))?;
            (host, port)
        } else {
            let (host, port) = s.rsplit_once(':').ok_or_else(|| invalid("missing port"))?;
            if host.contains(':') {
                return Err(invalid("IPv6 hosts must be written as [addr]:port"));
            }
            (host, port)
        };

        let port: u16 = port.parse().map_err(|_| invalid("port is not a number in 1-65535"))?;
        Endpoint::new(host, port).map_err(|_| {
            if host.is_empty() { invalid("host is empty") } else { invalid("port must be in 1-65535") }
        })
    }
}
