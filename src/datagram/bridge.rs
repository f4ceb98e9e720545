//! Datagram-over-stream bridge

use std::fmt;
use std::io;
use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::Mutex;

use super::PacketConn;
use crate::transport::BoxedStream;

/// Presents a stream as a datagram connection to a single peer
///
/// No framing is added: each `send_to` writes the payload bytes and each
/// `recv_from` performs one stream read.
pub struct StreamPacketConn {
    reader: Mutex<ReadHalf<BoxedStream>>,
    writer: Mutex<WriteHalf<BoxedStream>>,
    peer: SocketAddr,
}

impl StreamPacketConn {
    /// Bridge `stream`, attributing all traffic to `peer`
    #[must_use]
    pub fn new(stream: BoxedStream, peer: SocketAddr) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        Self {
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            peer,
        }
    }
}

#[async_trait]
impl PacketConn for StreamPacketConn {
    async fn send_to(&self, buf: &[u8], _addr: SocketAddr) -> io::Result<usize> {
        let mut writer = self.writer.lock().await;
        writer.write_all(buf).await?;
        writer.flush().await?;
        Ok(buf.len())
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        let n = self.reader.lock().await.read(buf).await?;
        if n == 0 && !buf.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "datagram stream closed",
            ));
        }
        Ok((n, self.peer))
    }

    fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    async fn close(&self) -> io::Result<()> {
        self.writer.lock().await.shutdown().await
    }
}

impl fmt::Debug for StreamPacketConn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamPacketConn")
            .field("peer", &self.peer)
            .finish_non_exhaustive()
    }
}
