//! Plain TCP dialer
//!
//! Opens the raw connection to the proxy server. Host names are resolved by
//! tokio; every resolved address is tried in order.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use socket2::{SockRef, TcpKeepalive};
use tokio::net::TcpStream;

use super::{DialedStream, Dialer, KeepAlive};

/// Keep-alive idle time applied to every session's raw connection
pub const DEFAULT_KEEPALIVE_IDLE: Duration = Duration::from_secs(30);

/// TCP dialer for the proxy server connection
///
/// # Thread Safety
///
/// `TcpDialer` is `Send + Sync` and can be shared across tasks.
#[derive(Debug, Clone, Copy)]
pub struct TcpDialer {
    nodelay: bool,
}

impl TcpDialer {
    /// Create a new TCP dialer with `TCP_NODELAY` enabled
    #[must_use]
    pub fn new() -> Self {
        Self { nodelay: true }
    }

    /// Set `TCP_NODELAY` option
    #[must_use]
    pub fn with_nodelay(mut self, enabled: bool) -> Self {
        self.nodelay = enabled;
        self
    }
}

impl Default for TcpDialer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Dialer for TcpDialer {
    async fn dial(&self, address: &str) -> io::Result<Box<dyn DialedStream>> {
        let stream = TcpStream::connect(address).await?;

        if self.nodelay {
            stream.set_nodelay(true)?;
        }

        tracing::debug!(
            address = %address,
            peer = ?stream.peer_addr().ok(),
            nodelay = self.nodelay,
            "TCP connection established"
        );

        Ok(Box::new(stream))
    }
}

impl KeepAlive for TcpStream {
    fn enable_keepalive(&self, idle: Duration) -> io::Result<()> {
        let keepalive = TcpKeepalive::new().with_time(idle).with_interval(idle);
        SockRef::from(self).set_tcp_keepalive(&keepalive)
    }
}
