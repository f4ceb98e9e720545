//! VLESS outbound session builder
//!
//! Builds one session per call:
//!
//! 1. Dial the proxy server (`Dialer`)
//! 2. Enable TCP keep-alive on the raw connection
//! 3. Apply the transport layer (`LayerEngine`: ws, tls, xtls or none)
//! 4. Write the VLESS request header (`ProtocolEncoder`)
//! 5. For UDP, adapt the stream into a `PacketConn`
//!
//! # Example
//!
//! ```no_run
//! use vless_outbound::config::VlessOption;
//! use vless_outbound::datagram::PacketConn;
//! use vless_outbound::outbound::{Metadata, VlessOutbound};
//! use vless_outbound::transport::SessionCacheProvider;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let option = VlessOption::new(
//!     "proxy",
//!     "proxy.example.com",
//!     443,
//!     "b831381d-6324-4d53-ad4f-8cda48b30811",
//! )
//! .with_tls()
//! .with_flow("xtls-rprx-origin");
//!
//! let outbound = VlessOutbound::new(option, &SessionCacheProvider::new())?;
//! let conn = outbound.dial_udp(&Metadata::udp_domain("dns.google", 53)).await?;
//! conn.send_to(b"query", conn.peer_addr()).await?;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::resolver::{Resolver, SystemResolver};
use super::traits::{ProtocolEncoder, ProxyAdapter};
use super::Metadata;
use crate::config::VlessOption;
use crate::datagram::{LengthPacketConn, PacketConn, StreamPacketConn};
use crate::error::OutboundError;
use crate::transport::{
    join_host_port, BoxedStream, DialedStream, Dialer, LayerEngine, SessionCacheProvider,
    TcpDialer, TransportError, DEFAULT_KEEPALIVE_IDLE,
};
use crate::vless::{VlessAddons, VlessClient, XTLS_ORIGIN_FLOW};

/// Fixed dial timeout of datagram sessions
pub const DIAL_UDP_TIMEOUT: Duration = Duration::from_secs(5);

/// Outbound connecting through a VLESS server
pub struct VlessOutbound {
    option: VlessOption,
    addr: String,
    engine: LayerEngine,
    dialer: Arc<dyn Dialer>,
    resolver: Arc<dyn Resolver>,
    encoder: Arc<dyn ProtocolEncoder>,
    udp_timeout: Duration,
}

impl VlessOutbound {
    /// Create an outbound with the default collaborators
    ///
    /// # Errors
    ///
    /// Returns `OutboundError::InvalidConfig` if the UUID does not parse.
    pub fn new(option: VlessOption, caches: &SessionCacheProvider) -> Result<Self, OutboundError> {
        let client = build_client(&option)?;
        Ok(Self::with_collaborators(
            option,
            LayerEngine::new(caches),
            Arc::new(TcpDialer::new()),
            Arc::new(SystemResolver),
            Arc::new(client),
        ))
    }

    /// Create an outbound with caller-supplied collaborators
    ///
    /// The TLS handshakers and WebSocket connector are carried by `engine`.
    #[must_use]
    pub fn with_collaborators(
        option: VlessOption,
        engine: LayerEngine,
        dialer: Arc<dyn Dialer>,
        resolver: Arc<dyn Resolver>,
        encoder: Arc<dyn ProtocolEncoder>,
    ) -> Self {
        let addr = join_host_port(&option.server, option.port);
        Self {
            option,
            addr,
            engine,
            dialer,
            resolver,
            encoder,
            udp_timeout: DIAL_UDP_TIMEOUT,
        }
    }

    /// The proxy configuration
    #[must_use]
    pub fn option(&self) -> &VlessOption {
        &self.option
    }

    /// Layer and encode an already dialed connection
    ///
    /// # Errors
    ///
    /// Returns the layer's `TransportError` or the encoder's `VlessError`.
    pub async fn stream_conn(
        &self,
        stream: BoxedStream,
        metadata: &Metadata,
    ) -> Result<BoxedStream, OutboundError> {
        let layered = self
            .engine
            .apply_layers(stream, &self.option.server, self.option.port, &self.option)
            .await
            .map_err(|e| {
                warn!(proxy = %self.option.name, error = %e, "transport layer failed");
                e
            })?;

        let session = self.encoder.wrap(layered, metadata).await?;

        debug!(
            proxy = %self.option.name,
            server = %self.addr,
            destination = %metadata,
            network = %metadata.network,
            "VLESS session established"
        );
        Ok(session)
    }

    /// Open a stream session
    ///
    /// The dial has no timeout of its own; it ends when `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns `OutboundError::Cancelled` if `cancel` fires before the dial
    /// completes, `OutboundError::Dial` if the dial fails, and the layer or
    /// encoder error otherwise.
    pub async fn dial_stream(
        &self,
        metadata: &Metadata,
        cancel: &CancellationToken,
    ) -> Result<BoxedStream, OutboundError> {
        let raw = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!(server = %self.addr, "dial cancelled");
                return Err(OutboundError::Cancelled {
                    address: self.addr.clone(),
                });
            }
            result = self.dialer.dial(&self.addr) => result.map_err(|e| self.dial_failed(e))?,
        };

        let stream = enable_keepalive(raw)?;
        self.stream_conn(stream, metadata).await
    }

    /// Open a datagram session
    ///
    /// An unresolved destination is resolved first so the returned
    /// connection can report a concrete peer address.
    ///
    /// # Errors
    ///
    /// Returns `OutboundError::Resolution` if the destination cannot be
    /// resolved, `OutboundError::Dial` or `OutboundError::Timeout` if the
    /// dial fails, and `OutboundError::UdpSetup` if layering or the encoder
    /// fails.
    pub async fn dial_udp(&self, metadata: &Metadata) -> Result<Box<dyn PacketConn>, OutboundError> {
        let metadata = self.resolve(metadata).await?;
        let peer = metadata
            .udp_addr()
            .ok_or_else(|| OutboundError::resolution(metadata.to_string(), "no address"))?;

        let raw = match tokio::time::timeout(self.udp_timeout, self.dialer.dial(&self.addr)).await
        {
            Ok(result) => result.map_err(|e| self.dial_failed(e))?,
            Err(_) => {
                warn!(server = %self.addr, timeout = ?self.udp_timeout, "dial timed out");
                return Err(OutboundError::Timeout {
                    address: self.addr.clone(),
                    timeout: self.udp_timeout,
                });
            }
        };

        let stream = enable_keepalive(raw)?;
        let stream = self
            .stream_conn(stream, &metadata)
            .await
            .map_err(OutboundError::udp_setup)?;

        let conn = StreamPacketConn::new(stream, peer);
        if self.option.is_xtls_origin() {
            Ok(Box::new(LengthPacketConn::new(conn)))
        } else {
            Ok(Box::new(conn))
        }
    }

    async fn resolve(&self, metadata: &Metadata) -> Result<Metadata, OutboundError> {
        if metadata.resolved() {
            return Ok(metadata.clone());
        }

        let host = metadata
            .host()
            .ok_or_else(|| OutboundError::resolution("", "destination has no host"))?;
        let ip = self
            .resolver
            .resolve_ip(host)
            .await
            .map_err(|e| OutboundError::resolution(host, e.to_string()))?;

        Ok(metadata.clone().with_ip(ip))
    }

    fn dial_failed(&self, e: std::io::Error) -> OutboundError {
        warn!(proxy = %self.option.name, server = %self.addr, error = %e, "dial failed");
        OutboundError::dial(&self.addr, e)
    }
}

/// The flow addon is sent only when TLS carries the origin flow
fn build_client(option: &VlessOption) -> Result<VlessClient, OutboundError> {
    let addons = if option.tls && option.is_xtls_origin() {
        VlessAddons::with_flow(XTLS_ORIGIN_FLOW)
    } else {
        VlessAddons::new()
    };
    VlessClient::from_uuid_str(&option.uuid, addons)
        .map_err(|e| OutboundError::InvalidConfig(format!("proxy '{}': {e}", option.name)))
}

fn enable_keepalive(raw: Box<dyn DialedStream>) -> Result<BoxedStream, OutboundError> {
    raw.enable_keepalive(DEFAULT_KEEPALIVE_IDLE)
        .map_err(|e| TransportError::socket_option("SO_KEEPALIVE", e.to_string()))?;
    Ok(raw.into_boxed())
}

#[async_trait]
impl ProxyAdapter for VlessOutbound {
    fn name(&self) -> &str {
        &self.option.name
    }

    fn addr(&self) -> &str {
        &self.addr
    }

    fn adapter_type(&self) -> &'static str {
        "vless"
    }

    fn supports_udp(&self) -> bool {
        self.option.udp
    }

    async fn dial_stream(
        &self,
        metadata: &Metadata,
        cancel: &CancellationToken,
    ) -> Result<BoxedStream, OutboundError> {
        VlessOutbound::dial_stream(self, metadata, cancel).await
    }

    async fn dial_udp(&self, metadata: &Metadata) -> Result<Box<dyn PacketConn>, OutboundError> {
        VlessOutbound::dial_udp(self, metadata).await
    }
}

impl fmt::Debug for VlessOutbound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VlessOutbound")
            .field("name", &self.option.name)
            .field("addr", &self.addr)
            .field("tls", &self.option.tls)
            .field("network", &self.option.network_mode())
            .field("flow", &self.option.flow)
            .finish_non_exhaustive()
    }
}
