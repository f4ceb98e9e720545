//! Outbound trait definitions
//!
//! `ProxyAdapter` is what a caller holds; `ProtocolEncoder` is the last step
//! of every session and is replaceable for tests.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::Metadata;
use crate::datagram::PacketConn;
use crate::error::OutboundError;
use crate::transport::BoxedStream;
use crate::vless::VlessError;

/// Speaks the proxy's application handshake over a layered connection
#[async_trait]
pub trait ProtocolEncoder: Send + Sync {
    /// Write the request for `metadata` and return the session stream
    ///
    /// # Errors
    ///
    /// Returns `VlessError` if the request cannot be encoded or written.
    async fn wrap(&self, stream: BoxedStream, metadata: &Metadata)
        -> Result<BoxedStream, VlessError>;
}

/// A configured proxy that opens stream and datagram sessions
#[async_trait]
pub trait ProxyAdapter: Send + Sync {
    /// Proxy name from the configuration
    fn name(&self) -> &str;

    /// Proxy server address (`host:port`)
    fn addr(&self) -> &str;

    /// Adapter type name
    fn adapter_type(&self) -> &'static str;

    /// Whether the proxy is configured to carry UDP
    fn supports_udp(&self) -> bool;

    /// Open a stream session to `metadata`
    ///
    /// # Errors
    ///
    /// Returns `OutboundError` if dialing, layering or the handshake fails,
    /// or if `cancel` fires first.
    async fn dial_stream(
        &self,
        metadata: &Metadata,
        cancel: &CancellationToken,
    ) -> Result<BoxedStream, OutboundError>;

    /// Open a datagram session to `metadata`
    ///
    /// # Errors
    ///
    /// Returns `OutboundError` if resolution, dialing, layering or the
    /// handshake fails.
    async fn dial_udp(&self, metadata: &Metadata) -> Result<Box<dyn PacketConn>, OutboundError>;
}
