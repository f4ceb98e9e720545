//! Datagram sessions carried over a stream
//!
//! A VLESS UDP session is a single stream to the proxy server. This module
//! adapts it to a datagram interface:
//!
//! ```text
//!   PacketConn::send_to ──> LengthPacketConn ──> StreamPacketConn ──> BoxedStream
//!                           ([len_hi len_lo]      (fixed peer,
//!                            + payload)            raw bytes)
//! ```
//!
//! [`StreamPacketConn`] writes payloads as-is and is used for standard
//! flows. [`LengthPacketConn`] adds a 2-byte big-endian length prefix per
//! datagram and is used for the `xtls-rprx-origin` flow.

mod bridge;
mod length;

pub use bridge::StreamPacketConn;
pub use length::{LengthPacketConn, MAX_DATAGRAM_LEN};

use std::io;
use std::net::SocketAddr;

use async_trait::async_trait;

/// Datagram-oriented connection bound to one peer
#[async_trait]
pub trait PacketConn: Send + Sync {
    /// Send one datagram; `addr` is ignored, the peer is fixed
    ///
    /// # Errors
    ///
    /// Returns the stream's write error.
    async fn send_to(&self, buf: &[u8], addr: SocketAddr) -> io::Result<usize>;

    /// Receive into `buf`, returning the byte count and the fixed peer
    ///
    /// # Errors
    ///
    /// Returns the stream's read error, or `UnexpectedEof` when the stream
    /// ends.
    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;

    /// The peer every datagram is attributed to
    fn peer_addr(&self) -> SocketAddr;

    /// Shut down the write side
    ///
    /// # Errors
    ///
    /// Returns the stream's shutdown error.
    async fn close(&self) -> io::Result<()>;
}
