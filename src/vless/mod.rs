//! VLESS protocol encoder
//!
//! The outbound side of VLESS: a request header is written as soon as the
//! transport layers are in place, and the server's response header is
//! consumed lazily on the first read.
//!
//! - **Request Header**: Version + UUID + Addons + Command + Port + Address
//! - **Response Header**: Version + Addons
//! - **Data Payload**: Raw traffic after headers
//!
//! Only the TCP (0x01) and UDP (0x02) commands are used. The single addon
//! understood is the flow, sent when the enhanced-TLS variant is active.
//!
//! # Example
//!
//! ```no_run
//! use vless_outbound::outbound::{Metadata, ProtocolEncoder};
//! use vless_outbound::vless::{VlessAddons, VlessClient};
//! use tokio::net::TcpStream;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = VlessClient::from_uuid_str(
//!     "b831381d-6324-4d53-ad4f-8cda48b30811",
//!     VlessAddons::new(),
//! )?;
//! let tcp = TcpStream::connect("proxy.example.com:80").await?;
//! let stream = client
//!     .wrap(Box::new(tcp), &Metadata::tcp_domain("example.com", 443))
//!     .await?;
//! # drop(stream);
//! # Ok(())
//! # }
//! ```

mod addons;
mod client;
mod error;
mod protocol;
mod stream;

pub use addons::{parse_addons, VlessAddons, XTLS_ORIGIN_FLOW};
pub use client::VlessClient;
pub use error::VlessError;
pub use protocol::{
    address_type, VlessAddress, VlessCommand, VlessRequestHeader, VlessResponseHeader,
    VLESS_VERSION,
};
pub use stream::VlessStream;
