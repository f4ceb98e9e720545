//! VLESS stream with deferred response header
//!
//! The server sends its response header only once the target has produced
//! data, so the stream is usable right after the request header is written.
//! `VlessStream` strips the response header on the first read and forwards
//! everything else untouched.
//!
//! ```text
//! +---------+--------+----------+
//! | Version | AddLen |  Addons  |
//! +---------+--------+----------+
//! |   1B    |   1B   | Variable |
//! +---------+--------+----------+
//! ```

use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tracing::{trace, warn};

use super::error::VlessError;
use super::protocol::VLESS_VERSION;

/// Version byte plus addons length byte
const FIXED_HEADER_LEN: usize = 2;

/// Stream that consumes the VLESS response header before yielding data
pub struct VlessStream<S> {
    inner: S,
    /// Header bytes collected so far, `None` once the header is consumed
    header: Option<Vec<u8>>,
}

impl<S> VlessStream<S> {
    /// Wrap a stream whose request header has already been written
    #[must_use]
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            header: Some(Vec::with_capacity(FIXED_HEADER_LEN)),
        }
    }

    /// Check if the response header has been consumed
    #[must_use]
    pub fn is_header_consumed(&self) -> bool {
        self.header.is_none()
    }
}

/// Bytes still missing from a partially read header
fn header_missing(header: &[u8]) -> usize {
    if header.len() < FIXED_HEADER_LEN {
        FIXED_HEADER_LEN - header.len()
    } else {
        FIXED_HEADER_LEN + usize::from(header[1]) - header.len()
    }
}

impl<S: AsyncRead + Unpin> VlessStream<S> {
    /// Drive the inner stream until the whole response header is read
    ///
    /// Reads never go past the header, so no payload byte is buffered here.
    fn poll_header(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let Some(header) = self.header.as_mut() else {
            return Poll::Ready(Ok(()));
        };

        loop {
            let missing = header_missing(header);
            if missing == 0 {
                break;
            }

            let mut chunk = [0u8; 256];
            let mut read_buf = ReadBuf::new(&mut chunk[..missing]);
            ready!(Pin::new(&mut self.inner).poll_read(cx, &mut read_buf))?;

            let filled = read_buf.filled();
            if filled.is_empty() {
                return Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed before VLESS response header",
                )));
            }
            header.extend_from_slice(filled);

            if header[0] != VLESS_VERSION {
                warn!(version = header[0], "invalid VLESS response version");
                return Poll::Ready(Err(VlessError::InvalidVersion(header[0]).into()));
            }
        }

        trace!(header_len = header.len(), "VLESS response header consumed");
        self.header = None;
        Poll::Ready(Ok(()))
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for VlessStream<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        ready!(this.poll_header(cx))?;
        Pin::new(&mut this.inner).poll_read(cx, buf)
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for VlessStream<S> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}
