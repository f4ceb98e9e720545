//! Outbound module
//!
//! [`VlessOutbound`] turns a [`VlessOption`](crate::config::VlessOption) into
//! stream and datagram sessions through a VLESS server. It is the only
//! [`ProxyAdapter`] this crate ships.
//!
//! # Example
//!
//! ```no_run
//! use vless_outbound::config::VlessOption;
//! use vless_outbound::outbound::{Metadata, ProxyAdapter, VlessOutbound};
//! use vless_outbound::transport::SessionCacheProvider;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let caches = SessionCacheProvider::new();
//! let option = VlessOption::new(
//!     "ws-proxy",
//!     "cdn.example.com",
//!     443,
//!     "b831381d-6324-4d53-ad4f-8cda48b30811",
//! )
//! .with_tls()
//! .with_websocket("/ray");
//!
//! let adapter: Box<dyn ProxyAdapter> = Box::new(VlessOutbound::new(option, &caches)?);
//! let stream = adapter
//!     .dial_stream(&Metadata::tcp_domain("example.com", 443), &CancellationToken::new())
//!     .await?;
//! # drop(stream);
//! # Ok(())
//! # }
//! ```

mod metadata;
mod resolver;
mod traits;
mod vless;

pub use metadata::{Metadata, Network};
pub use resolver::{Resolver, SystemResolver};
pub use traits::{ProtocolEncoder, ProxyAdapter};
pub use vless::{VlessOutbound, DIAL_UDP_TIMEOUT};
