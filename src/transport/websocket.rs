//! WebSocket layer built on tokio-tungstenite
//!
//! Upgrades an already dialed stream to WebSocket framing. When TLS is
//! enabled the handshake happens here, before the upgrade, and no separate
//! TLS layer follows.
//!
//! # Message Handling
//!
//! - **Read**: Binary and text payloads are returned as bytes
//! - **Write**: Each write is sent as one binary message
//! - **Ping/Pong**: Skipped on read; tungstenite queues the pong replies
//! - **Close**: Reported as end of stream

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};

use async_trait::async_trait;
use bytes::{Buf, BytesMut};
use futures::sink::Sink;
use futures::stream::Stream;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio_tungstenite::tungstenite::handshake::client::generate_key;
use tokio_tungstenite::tungstenite::http::Request;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::WebSocketStream;

use super::{join_host_port, BoxedStream, RustlsHandshaker, TlsHandshaker, TlsParams};
use super::{TransportError, WebSocketConnector};

/// Parameters for one WebSocket upgrade
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebSocketParams {
    /// Server host used in the request URI and default `Host` header
    pub host: String,

    /// Server port
    pub port: u16,

    /// Request path (e.g. "/ws")
    pub path: String,

    /// Extra request headers, in order; duplicates are all sent
    pub headers: Vec<(String, String)>,

    /// TLS to perform before the upgrade (`wss://`)
    pub tls: Option<TlsParams>,
}

impl WebSocketParams {
    /// Create plain (`ws://`) parameters
    pub fn new(host: impl Into<String>, port: u16, path: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            path: path.into(),
            headers: Vec::new(),
            tls: None,
        }
    }

    /// Add a request header
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Perform TLS before the upgrade
    #[must_use]
    pub fn with_tls(mut self, tls: TlsParams) -> Self {
        self.tls = Some(tls);
        self
    }

    /// Whether a custom `Host` header replaces the default one
    fn has_host_header(&self) -> bool {
        self.headers
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case("host"))
    }

    /// Build the upgrade request
    fn build_request(&self) -> Result<Request<()>, TransportError> {
        let scheme = if self.tls.is_some() { "wss" } else { "ws" };
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };
        let authority = join_host_port(&self.host, self.port);
        let url = format!("{scheme}://{authority}{path}");

        let mut builder = Request::builder()
            .uri(&url)
            .header("Connection", "Upgrade")
            .header("Upgrade", "websocket")
            .header("Sec-WebSocket-Version", "13")
            .header("Sec-WebSocket-Key", generate_key());

        if !self.has_host_header() {
            builder = builder.header("Host", authority.as_str());
        }

        // `header` appends, so repeated names are all kept
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        builder
            .body(())
            .map_err(|e| TransportError::invalid_websocket_url(e.to_string()))
    }
}

/// Default [`WebSocketConnector`]
///
/// TLS, when requested, is delegated to a [`TlsHandshaker`]; by default the
/// standard rustls handshaker.
#[derive(Clone)]
pub struct WebSocketLayer {
    tls: Arc<dyn TlsHandshaker>,
}

impl WebSocketLayer {
    /// Create a WebSocket layer using the standard rustls handshaker
    #[must_use]
    pub fn new() -> Self {
        Self::with_tls_handshaker(Arc::new(RustlsHandshaker::standard()))
    }

    /// Create a WebSocket layer with a custom TLS handshaker
    #[must_use]
    pub fn with_tls_handshaker(tls: Arc<dyn TlsHandshaker>) -> Self {
        Self { tls }
    }
}

impl Default for WebSocketLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for WebSocketLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketLayer").finish_non_exhaustive()
    }
}

#[async_trait]
impl WebSocketConnector for WebSocketLayer {
    async fn connect(
        &self,
        stream: BoxedStream,
        params: &WebSocketParams,
    ) -> Result<BoxedStream, TransportError> {
        let request = params.build_request()?;

        let stream = match &params.tls {
            Some(tls) => self.tls.handshake(stream, tls).await?,
            None => stream,
        };

        let (ws_stream, response) = tokio_tungstenite::client_async(request, stream)
            .await
            .map_err(|e| TransportError::websocket_handshake(e.to_string()))?;

        tracing::debug!(
            host = %params.host,
            path = %params.path,
            tls = params.tls.is_some(),
            status = %response.status(),
            "WebSocket connection established"
        );

        Ok(Box::new(WebSocketWrapper::new(ws_stream)))
    }
}

/// Byte-stream view of a WebSocket connection
pub struct WebSocketWrapper<S> {
    inner: WebSocketStream<S>,
    /// Unread tail of the last message
    read_buffer: BytesMut,
}

impl<S> WebSocketWrapper<S> {
    /// Wrap an upgraded WebSocket stream
    pub fn new(inner: WebSocketStream<S>) -> Self {
        Self {
            inner,
            read_buffer: BytesMut::with_capacity(8192),
        }
    }
}

impl<S> std::fmt::Debug for WebSocketWrapper<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketWrapper")
            .field("read_buffer_len", &self.read_buffer.len())
            .finish()
    }
}

fn ws_error(e: impl std::fmt::Display) -> io::Error {
    io::Error::other(e.to_string())
}

impl<S> AsyncRead for WebSocketWrapper<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        loop {
            if !this.read_buffer.is_empty() {
                let to_copy = this.read_buffer.len().min(buf.remaining());
                buf.put_slice(&this.read_buffer[..to_copy]);
                this.read_buffer.advance(to_copy);
                return Poll::Ready(Ok(()));
            }

            match ready!(Pin::new(&mut this.inner).poll_next(cx)) {
                Some(Ok(Message::Binary(data))) => this.read_buffer.extend_from_slice(&data),
                Some(Ok(Message::Text(text))) => this.read_buffer.extend_from_slice(text.as_bytes()),
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
                Some(Ok(Message::Close(_))) | None => return Poll::Ready(Ok(())),
                Some(Err(e)) => return Poll::Ready(Err(ws_error(e))),
            }
        }
    }
}

impl<S> AsyncWrite for WebSocketWrapper<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();

        ready!(Pin::new(&mut this.inner).poll_ready(cx)).map_err(ws_error)?;

        Pin::new(&mut this.inner)
            .start_send(Message::Binary(buf.to_vec()))
            .map_err(ws_error)?;

        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner)
            .poll_flush(cx)
            .map_err(ws_error)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner)
            .poll_close(cx)
            .map_err(ws_error)
    }
}
