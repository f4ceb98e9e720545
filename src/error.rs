//! Error types for vless-outbound
//!
//! Transport-level failures live in [`crate::transport::TransportError`] and
//! protocol encoding failures in [`crate::vless::VlessError`]. This module
//! holds the errors surfaced by the session builder and the configuration
//! layer.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::transport::TransportError;
use crate::vless::VlessError;

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File not found or inaccessible
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    /// JSON parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Validation error (invalid values, missing required fields)
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    /// Environment variable error
    #[error("Environment variable error: {name}: {reason}")]
    EnvError { name: String, reason: String },

    /// I/O error while reading config
    #[error("I/O error reading configuration: {0}")]
    IoError(#[from] io::Error),
}

impl ConfigError {
    /// Config errors are not recoverable without user intervention
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        false
    }
}

/// Errors produced while building an outbound session
///
/// Every variant aborts the whole pipeline: there is no partial success and
/// no fallback between layer variants.
#[derive(Debug, Error)]
pub enum OutboundError {
    /// Dialing the proxy server failed
    #[error("{address} connect error: {source}")]
    Dial {
        /// Proxy server address (host:port)
        address: String,
        /// Underlying cause
        #[source]
        source: io::Error,
    },

    /// The UDP destination name could not be resolved
    #[error("can't resolve ip for {host}: {reason}")]
    Resolution {
        /// Host that failed to resolve
        host: String,
        /// Failure reason
        reason: String,
    },

    /// A transport layer (TLS, enhanced TLS, WebSocket) failed
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The VLESS request could not be encoded or written
    #[error(transparent)]
    Protocol(#[from] VlessError),

    /// Setting up the stream behind a datagram session failed
    #[error("new vless client error: {0}")]
    UdpSetup(#[source] Box<OutboundError>),

    /// Dialing did not complete within the fixed timeout
    #[error("{address} connect timed out after {}ms", .timeout.as_millis())]
    Timeout {
        /// Proxy server address (host:port)
        address: String,
        /// Timeout that elapsed
        timeout: Duration,
    },

    /// The caller cancelled the dial
    #[error("{address} connect cancelled")]
    Cancelled {
        /// Proxy server address (host:port)
        address: String,
    },

    /// The outbound configuration is unusable
    #[error("invalid vless configuration: {0}")]
    InvalidConfig(String),
}

impl OutboundError {
    /// Check if this error is recoverable (a later attempt may succeed)
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Dial { .. } | Self::Timeout { .. } | Self::Resolution { .. } => true,
            Self::Transport(e) => e.is_recoverable(),
            Self::Protocol(e) => e.is_recoverable(),
            Self::UdpSetup(inner) => inner.is_recoverable(),
            Self::Cancelled { .. } | Self::InvalidConfig(_) => false,
        }
    }

    /// Create a dial error
    pub fn dial(address: impl Into<String>, source: io::Error) -> Self {
        Self::Dial {
            address: address.into(),
            source,
        }
    }

    /// Create a resolution error
    pub fn resolution(host: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Resolution {
            host: host.into(),
            reason: reason.into(),
        }
    }

    /// Wrap a stream setup failure of a datagram session
    #[must_use]
    pub fn udp_setup(inner: OutboundError) -> Self {
        Self::UdpSetup(Box::new(inner))
    }
}
