//! Connection metadata: what the proxy is asked to reach

use std::fmt;
use std::net::{IpAddr, SocketAddr};

/// Transport of the proxied connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Network {
    /// Stream traffic
    Tcp,
    /// Datagram traffic
    Udp,
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => write!(f, "tcp"),
            Self::Udp => write!(f, "udp"),
        }
    }
}

/// Target of a proxied connection
///
/// At least one of `host` and `dst_ip` must be set for the request header
/// to be encodable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    /// Stream or datagram
    pub network: Network,
    /// Destination host name
    pub host: Option<String>,
    /// Resolved destination address
    pub dst_ip: Option<IpAddr>,
    /// Destination port
    pub dst_port: u16,
}

impl Metadata {
    /// TCP target by host name
    #[must_use]
    pub fn tcp_domain(host: impl Into<String>, port: u16) -> Self {
        Self {
            network: Network::Tcp,
            host: Some(host.into()),
            dst_ip: None,
            dst_port: port,
        }
    }

    /// TCP target by address
    #[must_use]
    pub fn tcp_ip(ip: IpAddr, port: u16) -> Self {
        Self {
            network: Network::Tcp,
            host: None,
            dst_ip: Some(ip),
            dst_port: port,
        }
    }

    /// UDP target by host name
    #[must_use]
    pub fn udp_domain(host: impl Into<String>, port: u16) -> Self {
        Self {
            network: Network::Udp,
            ..Self::tcp_domain(host, port)
        }
    }

    /// UDP target by address
    #[must_use]
    pub fn udp_ip(ip: IpAddr, port: u16) -> Self {
        Self {
            network: Network::Udp,
            ..Self::tcp_ip(ip, port)
        }
    }

    /// Attach a resolved address
    #[must_use]
    pub fn with_ip(mut self, ip: IpAddr) -> Self {
        self.dst_ip = Some(ip);
        self
    }

    /// Whether the destination address is known
    #[must_use]
    pub fn resolved(&self) -> bool {
        self.dst_ip.is_some()
    }

    /// Socket address of a resolved destination
    #[must_use]
    pub fn udp_addr(&self) -> Option<SocketAddr> {
        self.dst_ip.map(|ip| SocketAddr::new(ip, self.dst_port))
    }

    /// Host name, if any
    #[must_use]
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref().filter(|h| !h.is_empty())
    }
}

impl fmt::Display for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.host(), self.dst_ip) {
            (Some(host), _) if host.contains(':') => write!(f, "[{host}]:{}", self.dst_port),
            (Some(host), _) => write!(f, "{host}:{}", self.dst_port),
            (None, Some(ip)) => write!(f, "{}", SocketAddr::new(ip, self.dst_port)),
            (None, None) => write!(f, "<unknown>:{}", self.dst_port),
        }
    }
}
