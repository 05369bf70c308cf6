//! Server endpoint
//!
//! Host/port pair identifying the server to dial.

use std::fmt;
use std::io;
use std::net::{TcpStream, ToSocketAddrs};
use std::str::FromStr;
use std::time::Duration;

use crate::error::RgbError;

/// Address of a color-command server
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Host name or IP address
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Open a TCP stream to this endpoint
    ///
    /// Without a timeout this is the platform's blocking connect. With one,
    /// each resolved address is tried in turn and the last failure returned.
    pub fn connect(&self, timeout: Option<Duration>) -> io::Result<TcpStream> {
        let addr = (self.host.as_str(), self.port);

        let Some(timeout) = timeout else {
            return TcpStream::connect(addr);
        };

        let mut last_error = None;
        for socket_addr in addr.to_socket_addrs()? {
            match TcpStream::connect_timeout(&socket_addr, timeout) {
                Ok(stream) => return Ok(stream),
                Err(e) => last_error = Some(e),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} did not resolve to any address", self),
            )
        }))
    }
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
    type Err = RgbError;

    /// Parse `host:port`, with IPv6 hosts in brackets (`[::1]:4242`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .trim()
            .rsplit_once(':')
            .ok_or_else(|| RgbError::Config(format!("expected host:port, got {:?}", s)))?;

        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);
        if host.is_empty() {
            return Err(RgbError::Config(format!("missing host in {:?}", s)));
        }

        let port = port
            .parse::<u16>()
            .map_err(|e| RgbError::Config(format!("invalid port in {:?}: {}", s, e)))?;

        Ok(Self::new(host, port))
    }
}
