//! Host name resolution for datagram sessions

use std::io;
use std::net::IpAddr;

use async_trait::async_trait;
use tracing::trace;

/// Resolves a host name to a single address
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Resolve `host` to one IP address
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the lookup fails or yields no address.
    async fn resolve_ip(&self, host: &str) -> io::Result<IpAddr>;
}

/// System resolver backed by `tokio::net::lookup_host`
///
/// IPv4 results are preferred; an IPv6 address is returned only when the
/// host has no IPv4 address.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait]
impl Resolver for SystemResolver {
    async fn resolve_ip(&self, host: &str) -> io::Result<IpAddr> {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(ip);
        }

        let addrs: Vec<IpAddr> = tokio::net::lookup_host((host, 0))
            .await?
            .map(|addr| addr.ip())
            .collect();

        let ip = addrs
            .iter()
            .find(|ip| ip.is_ipv4())
            .or_else(|| addrs.first())
            .copied()
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, format!("no address for {host}"))
            })?;

        trace!(host, %ip, "resolved");
        Ok(ip)
    }
}
