//! Transport layer for vless-outbound
//!
//! This module turns a raw connection to the proxy server into the stream the
//! VLESS encoder writes to. Each layer takes the stream by value and returns
//! a new [`BoxedStream`], so a wrapped handle can never be used underneath
//! the layer that replaced it.
//!
//! # Architecture
//!
//! ```text
//!   Dialer::dial()            (TcpDialer: TCP + TCP_NODELAY)
//!       |
//!       v
//!   DialedStream::enable_keepalive()
//!       |
//!       v
//!   LayerEngine::plan()  ──>  LayerPlan
//!       |                       +-> WebSocket  (WebSocketConnector, TLS inside)
//!       v                       +-> Tls        (standard TlsHandshaker)
//!   LayerEngine::apply_layers() +-> EnhancedTls (enhanced TlsHandshaker)
//!                               +-> Passthrough
//! ```
//!
//! The collaborators behind each step are traits so that callers (and
//! tests) can substitute their own dialer, TLS handshaker or WebSocket
//! connector.
//!
//! # Security Considerations
//!
//! - TLS connections verify against Mozilla's root certificates via `webpki-roots`
//! - `skip-cert-verify` disables verification entirely (not recommended)
//! - The standard and enhanced TLS variants never share resumption state

mod error;
mod layering;
mod session_cache;
mod tcp;
mod tls;
mod websocket;

pub use error::TransportError;
pub use layering::{LayerEngine, LayerPlan};
pub use session_cache::{SessionCacheProvider, SESSION_CACHE_CAPACITY};
pub use tcp::{TcpDialer, DEFAULT_KEEPALIVE_IDLE};
pub use tls::{RustlsHandshaker, TlsParams, TlsVariant};
pub use websocket::{WebSocketLayer, WebSocketParams, WebSocketWrapper};

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

/// A bidirectional async byte stream
///
/// Implemented for every `AsyncRead + AsyncWrite + Unpin + Send` type.
pub trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> AsyncStream for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

/// Owned, type-erased layered connection
pub type BoxedStream = Box<dyn AsyncStream>;

/// Socket-level keep-alive control for freshly dialed connections
pub trait KeepAlive {
    /// Enable TCP keep-alive probes after `idle` of inactivity
    ///
    /// # Errors
    ///
    /// Returns the socket error if the option cannot be set.
    fn enable_keepalive(&self, idle: Duration) -> io::Result<()>;
}

/// A raw connection returned by a [`Dialer`]
///
/// Still exposes socket options; once boxed it is just a byte stream.
pub trait DialedStream: AsyncStream + KeepAlive {
    /// Erase the concrete type
    fn into_boxed(self: Box<Self>) -> BoxedStream;
}

impl<T> DialedStream for T
where
    T: AsyncStream + KeepAlive + 'static,
{
    fn into_boxed(self: Box<Self>) -> BoxedStream {
        self
    }
}

/// Opens raw connections to the proxy server
#[async_trait]
pub trait Dialer: Send + Sync {
    /// Connect to `address` (`host:port`)
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error; callers attach the address.
    async fn dial(&self, address: &str) -> io::Result<Box<dyn DialedStream>>;
}

/// Performs a TLS client handshake over an existing stream
#[async_trait]
pub trait TlsHandshaker: Send + Sync {
    /// Wrap `stream` in TLS according to `params`
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if the server name is invalid or the
    /// handshake fails.
    async fn handshake(
        &self,
        stream: BoxedStream,
        params: &TlsParams,
    ) -> Result<BoxedStream, TransportError>;
}

/// Upgrades an existing stream to WebSocket framing
#[async_trait]
pub trait WebSocketConnector: Send + Sync {
    /// Perform the (optionally TLS-wrapped) WebSocket upgrade on `stream`
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if TLS or the upgrade fails.
    async fn connect(
        &self,
        stream: BoxedStream,
        params: &WebSocketParams,
    ) -> Result<BoxedStream, TransportError>;
}

/// Join a host and port, bracketing IPv6 literals
#[must_use]
pub fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}
