//! Transport layer error types
//!
//! Errors raised while preparing the dialed stream or wrapping it in TLS or
//! WebSocket framing. Dial failures themselves are reported by the outbound.

use std::io;

use thiserror::Error;

/// Transport layer errors
#[derive(Debug, Error)]
pub enum TransportError {
    /// TLS configuration error
    #[error("TLS configuration error: {0}")]
    TlsConfigError(String),

    /// TLS handshake failed
    #[error("TLS handshake with {server_name} failed: {source}")]
    TlsHandshakeFailed {
        /// Server name (SNI)
        server_name: String,
        /// Underlying cause
        #[source]
        source: io::Error,
    },

    /// Invalid server name for TLS SNI
    #[error("Invalid server name for TLS SNI: {0}")]
    InvalidServerName(String),

    /// WebSocket upgrade rejected or failed
    #[error("WebSocket handshake failed: {0}")]
    WebSocketHandshakeFailed(String),

    /// The upgrade request could not be built
    #[error("Invalid WebSocket URL: {0}")]
    InvalidWebSocketUrl(String),

    /// Socket option error
    #[error("Failed to set socket option {option}: {reason}")]
    SocketOption {
        /// Option name
        option: String,
        /// Failure reason
        reason: String,
    },
}

impl TransportError {
    /// Check if this error is recoverable (can retry)
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::TlsHandshakeFailed { .. } | Self::WebSocketHandshakeFailed(_) => true,
            Self::TlsConfigError(_)
            | Self::InvalidServerName(_)
            | Self::InvalidWebSocketUrl(_)
            | Self::SocketOption { .. } => false,
        }
    }

    /// Create a TLS configuration error
    pub fn tls_config(msg: impl Into<String>) -> Self {
        Self::TlsConfigError(msg.into())
    }

    /// Create a TLS handshake failed error
    pub fn tls_handshake(server_name: impl Into<String>, source: io::Error) -> Self {
        Self::TlsHandshakeFailed {
            server_name: server_name.into(),
            source,
        }
    }

    /// Create an invalid server name error
    pub fn invalid_server_name(name: impl Into<String>) -> Self {
        Self::InvalidServerName(name.into())
    }

    /// Create a WebSocket handshake failed error
    pub fn websocket_handshake(msg: impl Into<String>) -> Self {
        Self::WebSocketHandshakeFailed(msg.into())
    }

    /// Create an invalid WebSocket URL error
    pub fn invalid_websocket_url(msg: impl Into<String>) -> Self {
        Self::InvalidWebSocketUrl(msg.into())
    }

    /// Create a socket option error
    pub fn socket_option(option: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SocketOption {
            option: option.into(),
            reason: reason.into(),
        }
    }
}
