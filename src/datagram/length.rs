//! Length-prefixed datagram framing
//!
//! Each datagram on the wire is a 2-byte big-endian length followed by that
//! many payload bytes:
//!
//! ```text
//! +--------+--------+-----------------+
//! | len_hi | len_lo |  payload (len)  |
//! +--------+--------+-----------------+
//! ```
//!
//! A caller buffer smaller than the frame receives the frame in pieces; the
//! adapter remembers how many bytes of the current frame are still owed.

use std::fmt;
use std::io;
use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::trace;

use super::{PacketConn, StreamPacketConn};

/// Largest payload a 2-byte length prefix can announce
pub const MAX_DATAGRAM_LEN: usize = u16::MAX as usize;

const PREFIX_LEN: usize = 2;

#[derive(Debug, Default)]
struct FrameState {
    /// Payload bytes of the current frame not yet delivered
    remain: usize,
    /// Prefix bytes read so far
    prefix: [u8; PREFIX_LEN],
    prefix_read: usize,
}

/// Datagram adapter adding a 2-byte length prefix per datagram
pub struct LengthPacketConn<P = StreamPacketConn> {
    inner: P,
    state: Mutex<FrameState>,
}

impl<P: PacketConn> LengthPacketConn<P> {
    /// Wrap a raw datagram bridge
    #[must_use]
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            state: Mutex::new(FrameState::default()),
        }
    }

    /// Payload bytes still owed from the current frame
    ///
    /// Zero means the next `recv_from` starts a new frame.
    pub async fn pending(&self) -> usize {
        self.state.lock().await.remain
    }

    /// Read until the prefix is complete
    ///
    /// Progress is kept in `state`, so a cancelled or failed call resumes
    /// where it stopped.
    async fn read_prefix(&self, state: &mut FrameState) -> io::Result<usize> {
        while state.prefix_read < PREFIX_LEN {
            let (n, _) = self
                .inner
                .recv_from(&mut state.prefix[state.prefix_read..])
                .await?;
            state.prefix_read += n;
        }
        state.prefix_read = 0;
        Ok(usize::from(u16::from_be_bytes(state.prefix)))
    }
}

#[async_trait]
impl<P: PacketConn> PacketConn for LengthPacketConn<P> {
    async fn send_to(&self, buf: &[u8], addr: SocketAddr) -> io::Result<usize> {
        let len = u16::try_from(buf.len()).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "datagram too large: {} bytes (max {MAX_DATAGRAM_LEN})",
                    buf.len()
                ),
            )
        })?;

        let mut frame = Vec::with_capacity(PREFIX_LEN + buf.len());
        frame.extend_from_slice(&len.to_be_bytes());
        frame.extend_from_slice(buf);
        self.inner.send_to(&frame, addr).await?;

        Ok(buf.len())
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        let mut state = self.state.lock().await;
        let peer = self.inner.peer_addr();

        if state.remain == 0 {
            let len = self.read_prefix(&mut state).await?;
            trace!(len, "datagram frame announced");
            if len == 0 {
                return Ok((0, peer));
            }
            state.remain = len;
        }

        let want = state.remain.min(buf.len());
        let (n, _) = self.inner.recv_from(&mut buf[..want]).await?;
        state.remain -= n;

        Ok((n, peer))
    }

    fn peer_addr(&self) -> SocketAddr {
        self.inner.peer_addr()
    }

    async fn close(&self) -> io::Result<()> {
        self.inner.close().await
    }
}

impl<P: fmt::Debug> fmt::Debug for LengthPacketConn<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LengthPacketConn")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}
