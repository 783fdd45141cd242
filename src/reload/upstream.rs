// src/reload/upstream.rs

use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    #[error("only http:// upstreams can be tunnelled (got {0}://)")]
    UnsupportedScheme(String),
    #[error("missing scheme, expected http://host[:port]")]
    MissingScheme,
    #[error("missing host")]
    MissingHost,
    #[error("invalid port {0:?}")]
    InvalidPort(String),
}

/// The site the reload server forwards ordinary requests to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upstream {
    host: String,
    port: u16,
}

impl Upstream {
    /// Parse `http://host[:port][/...]`. Any path is ignored.
    pub fn parse(url: &str) -> Result<Self, UpstreamError> {
        let (scheme, rest) = url
            .trim()
            .split_once("://")
            .ok_or(UpstreamError::MissingScheme)?;
        if !scheme.eq_ignore_ascii_case("http") {
            return Err(UpstreamError::UnsupportedScheme(scheme.to_string()));
        }

        let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
        let authority = authority.rsplit('@').next().unwrap_or(authority);
        if authority.is_empty() {
            return Err(UpstreamError::MissingHost);
        }

        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| UpstreamError::InvalidPort(port.to_string()))?;
                (host, port)
            }
            _ => (authority, 80),
        };
        if host.is_empty() {
            return Err(UpstreamError::MissingHost);
        }

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `host:port` suitable for `TcpStream::connect`.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Value for the forwarded `Host` header.
    pub fn host_header(&self) -> String {
        if self.port == 80 {
            self.host.clone()
        } else {
            self.addr()
        }
    }
}

impl fmt::Display for Upstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "http://{}", self.host_header())
    }
}
