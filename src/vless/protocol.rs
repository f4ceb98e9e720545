//! VLESS wire format
//!
//! ## Request Header
//!
//! ```text
//! +---------+------+--------+---------+------+------+---------+
//! | Version | UUID | Addons | Command | Port | Atyp | Address |
//! +---------+------+--------+---------+------+------+---------+
//! |   1B    | 16B  |  Var   |   1B    |  2B  |  1B  |   Var   |
//! +---------+------+--------+---------+------+------+---------+
//! ```
//!
//! ## Response Header
//!
//! ```text
//! +---------+--------+
//! | Version | Addons |
//! +---------+--------+
//! |   1B    |  Var   |
//! +---------+--------+
//! ```
//!
//! The client only ever writes requests and reads responses. Request
//! decoding exists for servers and test harnesses.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::addons::{parse_addons, VlessAddons};
use super::error::VlessError;

/// VLESS protocol version (always 0)
pub const VLESS_VERSION: u8 = 0;

/// VLESS command types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum VlessCommand {
    /// TCP stream
    Tcp = 0x01,
    /// UDP packets carried over the stream
    Udp = 0x02,
}

impl VlessCommand {
    /// Parse a command byte
    ///
    /// # Errors
    ///
    /// Returns `VlessError::InvalidCommand` for unknown bytes.
    pub fn from_byte(b: u8) -> Result<Self, VlessError> {
        match b {
            0x01 => Ok(Self::Tcp),
            0x02 => Ok(Self::Udp),
            _ => Err(VlessError::InvalidCommand(b)),
        }
    }

    /// Command byte on the wire
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for VlessCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => write!(f, "TCP"),
            Self::Udp => write!(f, "UDP"),
        }
    }
}

/// Address type constants
pub mod address_type {
    /// IPv4 address (4 bytes)
    pub const IPV4: u8 = 0x01;
    /// Domain name (length + string)
    pub const DOMAIN: u8 = 0x02;
    /// IPv6 address (16 bytes)
    pub const IPV6: u8 = 0x03;
}

/// Destination address in a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VlessAddress {
    /// IPv4 address
    Ipv4(Ipv4Addr),
    /// IPv6 address
    Ipv6(Ipv6Addr),
    /// Domain name
    Domain(String),
}

impl VlessAddress {
    /// Create a domain address
    #[must_use]
    pub fn domain(name: impl Into<String>) -> Self {
        Self::Domain(name.into())
    }

    /// Address type byte
    #[must_use]
    pub const fn address_type(&self) -> u8 {
        match self {
            Self::Ipv4(_) => address_type::IPV4,
            Self::Domain(_) => address_type::DOMAIN,
            Self::Ipv6(_) => address_type::IPV6,
        }
    }

    /// Append type byte and address bytes to `buf`
    fn encode_into(&self, buf: &mut Vec<u8>) -> Result<(), VlessError> {
        buf.push(self.address_type());
        match self {
            Self::Ipv4(ip) => buf.extend_from_slice(&ip.octets()),
            Self::Ipv6(ip) => buf.extend_from_slice(&ip.octets()),
            Self::Domain(domain) => {
                if domain.is_empty() {
                    return Err(VlessError::EmptyDomain);
                }
                let len =
                    u8::try_from(domain.len()).map_err(|_| VlessError::DomainTooLong(domain.len()))?;
                buf.push(len);
                buf.extend_from_slice(domain.as_bytes());
            }
        }
        Ok(())
    }

    async fn read_from<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Self, VlessError> {
        let atyp = reader.read_u8().await?;
        match atyp {
            address_type::IPV4 => {
                let mut octets = [0u8; 4];
                reader.read_exact(&mut octets).await?;
                Ok(Self::Ipv4(Ipv4Addr::from(octets)))
            }
            address_type::IPV6 => {
                let mut octets = [0u8; 16];
                reader.read_exact(&mut octets).await?;
                Ok(Self::Ipv6(Ipv6Addr::from(octets)))
            }
            address_type::DOMAIN => {
                let len = usize::from(reader.read_u8().await?);
                if len == 0 {
                    return Err(VlessError::EmptyDomain);
                }
                let mut buf = vec![0u8; len];
                reader.read_exact(&mut buf).await?;
                String::from_utf8(buf)
                    .map(Self::Domain)
                    .map_err(|e| VlessError::InvalidDomainEncoding(e.to_string()))
            }
            _ => Err(VlessError::InvalidAddressType(atyp)),
        }
    }
}

impl From<IpAddr> for VlessAddress {
    fn from(ip: IpAddr) -> Self {
        match ip {
            IpAddr::V4(v4) => Self::Ipv4(v4),
            IpAddr::V6(v6) => Self::Ipv6(v6),
        }
    }
}

impl fmt::Display for VlessAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ipv4(ip) => write!(f, "{ip}"),
            Self::Ipv6(ip) => write!(f, "[{ip}]"),
            Self::Domain(d) => write!(f, "{d}"),
        }
    }
}

/// Reads the addons blob that follows a length byte already consumed
async fn read_addons<R: AsyncRead + Unpin>(
    reader: &mut R,
    len: u8,
) -> Result<VlessAddons, VlessError> {
    if len == 0 {
        return Ok(VlessAddons::new());
    }
    let mut buf = vec![0u8; 1 + usize::from(len)];
    buf[0] = len;
    reader.read_exact(&mut buf[1..]).await?;
    Ok(parse_addons(&buf)?.0)
}

/// VLESS request header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VlessRequestHeader {
    /// UUID for authentication
    pub uuid: [u8; 16],

    /// Addons (flow)
    pub addons: VlessAddons,

    /// Command type
    pub command: VlessCommand,

    /// Destination port
    pub port: u16,

    /// Destination address
    pub address: VlessAddress,
}

impl VlessRequestHeader {
    /// Create a request header
    #[must_use]
    pub fn new(
        uuid: [u8; 16],
        addons: VlessAddons,
        command: VlessCommand,
        address: VlessAddress,
        port: u16,
    ) -> Self {
        Self {
            uuid,
            addons,
            command,
            port,
            address,
        }
    }

    /// Encode the request header
    ///
    /// # Errors
    ///
    /// Returns `VlessError` if the addons or the address cannot be encoded.
    pub fn encode(&self) -> Result<Vec<u8>, VlessError> {
        let addons = self.addons.encode()?;

        let mut buf = Vec::with_capacity(1 + 16 + addons.len() + 1 + 2 + 1 + 256);
        buf.push(VLESS_VERSION);
        buf.extend_from_slice(&self.uuid);
        buf.extend_from_slice(&addons);
        buf.push(self.command.as_byte());
        buf.extend_from_slice(&self.port.to_be_bytes());
        self.address.encode_into(&mut buf)?;

        Ok(buf)
    }

    /// Encode and write the header in one write
    ///
    /// # Errors
    ///
    /// Returns `VlessError` if encoding or I/O fails.
    pub async fn write_to<W: AsyncWrite + Unpin>(&self, writer: &mut W) -> Result<(), VlessError> {
        let encoded = self.encode()?;
        writer.write_all(&encoded).await?;
        Ok(())
    }

    /// Read a request header
    ///
    /// # Errors
    ///
    /// Returns `VlessError` if the header is malformed or I/O fails.
    pub async fn read_from<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Self, VlessError> {
        let version = reader.read_u8().await?;
        if version != VLESS_VERSION {
            return Err(VlessError::InvalidVersion(version));
        }

        let mut uuid = [0u8; 16];
        reader.read_exact(&mut uuid).await?;

        let addons_len = reader.read_u8().await?;
        let addons = read_addons(reader, addons_len).await?;

        let command = VlessCommand::from_byte(reader.read_u8().await?)?;
        let port = reader.read_u16().await?;
        let address = VlessAddress::read_from(reader).await?;

        Ok(Self {
            uuid,
            addons,
            command,
            port,
            address,
        })
    }
}

/// VLESS response header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VlessResponseHeader {
    /// Addons (unused by servers in practice)
    pub addons: VlessAddons,
}

impl VlessResponseHeader {
    /// Response without addons
    #[must_use]
    pub fn minimal() -> Self {
        Self {
            addons: VlessAddons::new(),
        }
    }

    /// Encode the response header
    ///
    /// # Errors
    ///
    /// Returns `VlessError` if the addons cannot be encoded.
    pub fn encode(&self) -> Result<Vec<u8>, VlessError> {
        let mut buf = vec![VLESS_VERSION];
        buf.extend(self.addons.encode()?);
        Ok(buf)
    }

    /// Encode and write the header
    ///
    /// # Errors
    ///
    /// Returns `VlessError` if encoding or I/O fails.
    pub async fn write_to<W: AsyncWrite + Unpin>(&self, writer: &mut W) -> Result<(), VlessError> {
        let encoded = self.encode()?;
        writer.write_all(&encoded).await?;
        Ok(())
    }

    /// Read a response header
    ///
    /// # Errors
    ///
    /// Returns `VlessError` if the header is malformed or I/O fails.
    pub async fn read_from<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Self, VlessError> {
        let version = reader.read_u8().await?;
        if version != VLESS_VERSION {
            return Err(VlessError::InvalidVersion(version));
        }
        let addons_len = reader.read_u8().await?;
        let addons = read_addons(reader, addons_len).await?;
        Ok(Self { addons })
    }
}
