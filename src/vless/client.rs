//! VLESS client-side request encoder

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::trace;
use uuid::Uuid;

use super::addons::VlessAddons;
use super::error::VlessError;
use super::protocol::{VlessAddress, VlessCommand, VlessRequestHeader};
use super::stream::VlessStream;
use crate::outbound::{Metadata, Network, ProtocolEncoder};
use crate::transport::BoxedStream;

/// Writes the VLESS request header onto a layered connection
#[derive(Debug, Clone)]
pub struct VlessClient {
    uuid: [u8; 16],
    addons: VlessAddons,
}

impl VlessClient {
    /// Create a client for the given user
    #[must_use]
    pub fn new(uuid: Uuid, addons: VlessAddons) -> Self {
        Self {
            uuid: *uuid.as_bytes(),
            addons,
        }
    }

    /// Parse a hyphenated UUID string
    ///
    /// # Errors
    ///
    /// Returns `VlessError::InvalidUuid` if the string is not a UUID.
    pub fn from_uuid_str(uuid: &str, addons: VlessAddons) -> Result<Self, VlessError> {
        let uuid = Uuid::parse_str(uuid).map_err(|e| VlessError::InvalidUuid(e.to_string()))?;
        Ok(Self::new(uuid, addons))
    }

    /// Addons sent with every request
    #[must_use]
    pub fn addons(&self) -> &VlessAddons {
        &self.addons
    }

    /// Build the request header for `metadata`
    ///
    /// The domain is preferred over the IP so the server resolves it itself,
    /// even when the caller has already resolved the destination.
    ///
    /// # Errors
    ///
    /// Returns `VlessError::MissingDestination` when the metadata carries
    /// neither a host nor an IP.
    pub fn request_header(&self, metadata: &Metadata) -> Result<VlessRequestHeader, VlessError> {
        let command = match metadata.network {
            Network::Tcp => VlessCommand::Tcp,
            Network::Udp => VlessCommand::Udp,
        };

        let address = match (&metadata.host, metadata.dst_ip) {
            (Some(host), _) if !host.is_empty() => VlessAddress::domain(host.clone()),
            (_, Some(ip)) => ip.into(),
            _ => return Err(VlessError::MissingDestination),
        };

        Ok(VlessRequestHeader::new(
            self.uuid,
            self.addons.clone(),
            command,
            address,
            metadata.dst_port,
        ))
    }
}

#[async_trait]
impl ProtocolEncoder for VlessClient {
    async fn wrap(
        &self,
        mut stream: BoxedStream,
        metadata: &Metadata,
    ) -> Result<BoxedStream, VlessError> {
        let header = self.request_header(metadata)?.encode()?;
        stream.write_all(&header).await?;
        stream.flush().await?;

        trace!(
            destination = %metadata,
            header_len = header.len(),
            flow = self.addons.flow.as_deref(),
            "VLESS request header sent"
        );

        Ok(Box::new(VlessStream::new(stream)))
    }
}
