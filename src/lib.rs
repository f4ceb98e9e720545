//! vless-outbound: outbound connection pipeline for a VLESS proxy client
//!
//! This crate builds one outbound connection to a VLESS server per call.
//! A raw TCP connection is wrapped in zero or more transport layers
//! (WebSocket framing, TLS or the enhanced-TLS variant), handed to the VLESS
//! request encoder, and for UDP traffic adapted into a datagram interface.
//!
//! # Architecture
//!
//! ```text
//!  Dialer ──> LayerEngine ──> ProtocolEncoder ──> stream session
//!   (TCP)    (ws | tls |        (VLESS header)         │
//!             xtls | none)                             v
//!                                      StreamPacketConn ──> LengthPacketConn
//!                                      (single peer)       (xtls-rprx-origin)
//! ```
//!
//! # Quick Start
//!
//! ```no_run
//! use vless_outbound::config::load_config;
//! use vless_outbound::outbound::{Metadata, VlessOutbound};
//! use vless_outbound::transport::SessionCacheProvider;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("/etc/vless-outbound/config.json")?;
//! let caches = SessionCacheProvider::new();
//!
//! let outbound = VlessOutbound::new(config.proxies[0].clone(), &caches)?;
//! let metadata = Metadata::tcp_domain("example.com", 443);
//! let stream = outbound.dial_stream(&metadata, &CancellationToken::new()).await?;
//! # drop(stream);
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration types and loading
//! - [`datagram`]: Datagram-over-stream bridge and length-prefixed framing
//! - [`error`]: Error types
//! - [`outbound`]: The VLESS session builder
//! - [`transport`]: Dialer, TLS, WebSocket and the layering engine
//! - [`vless`]: VLESS request/response header encoding

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod config;
pub mod datagram;
pub mod error;
pub mod outbound;
pub mod transport;
pub mod vless;

// Re-export commonly used types at the crate root
pub use config::{Config, LogConfig, VlessOption};
pub use datagram::{LengthPacketConn, PacketConn, StreamPacketConn};
pub use error::{ConfigError, OutboundError};
pub use outbound::{Metadata, Network, ProxyAdapter, VlessOutbound};
pub use transport::{BoxedStream, LayerEngine, LayerPlan, SessionCacheProvider, TransportError};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
