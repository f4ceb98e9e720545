//! VLESS protocol error types

use std::io;

use thiserror::Error;

/// Errors raised while encoding the VLESS request or decoding a header
#[derive(Debug, Error)]
pub enum VlessError {
    /// Invalid protocol version (expected 0)
    #[error("Invalid VLESS version: expected 0, got {0}")]
    InvalidVersion(u8),

    /// Invalid or malformed UUID
    #[error("Invalid UUID: {0}")]
    InvalidUuid(String),

    /// Invalid command byte
    #[error("Invalid command: {0:#04x} (expected 0x01=TCP, 0x02=UDP)")]
    InvalidCommand(u8),

    /// Invalid address type
    #[error("Invalid address type: {0:#04x} (expected 0x01=IPv4, 0x02=Domain, 0x03=IPv6)")]
    InvalidAddressType(u8),

    /// Domain name too long (max 255 bytes)
    #[error("Domain name too long: {0} bytes (max 255)")]
    DomainTooLong(usize),

    /// Empty domain name
    #[error("Empty domain name")]
    EmptyDomain,

    /// Invalid domain name encoding
    #[error("Invalid domain name encoding: {0}")]
    InvalidDomainEncoding(String),

    /// The metadata carries neither a host nor an IP
    #[error("Destination has neither host nor IP")]
    MissingDestination,

    /// Addons parsing error
    #[error("Failed to parse addons: {0}")]
    AddonsParseError(String),

    /// Addons encoding error
    #[error("Failed to encode addons: {0}")]
    AddonsEncodeError(String),

    /// I/O error during read/write
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl VlessError {
    /// Check if this error is recoverable
    ///
    /// Only transient I/O failures qualify; encoding errors repeat on retry.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::TimedOut
                    | io::ErrorKind::Interrupted
                    | io::ErrorKind::WouldBlock
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }

    /// Create an addons parse error
    pub fn addons_parse(msg: impl Into<String>) -> Self {
        Self::AddonsParseError(msg.into())
    }

    /// Create an addons encode error
    pub fn addons_encode(msg: impl Into<String>) -> Self {
        Self::AddonsEncodeError(msg.into())
    }
}

/// Convert `VlessError` to `std::io::Error` for use inside `AsyncRead`
impl From<VlessError> for io::Error {
    fn from(e: VlessError) -> Self {
        match e {
            VlessError::Io(io_err) => io_err,
            VlessError::InvalidVersion(_)
            | VlessError::InvalidCommand(_)
            | VlessError::InvalidAddressType(_)
            | VlessError::AddonsParseError(_) => {
                io::Error::new(io::ErrorKind::InvalidData, e.to_string())
            }
            VlessError::InvalidUuid(_)
            | VlessError::DomainTooLong(_)
            | VlessError::EmptyDomain
            | VlessError::InvalidDomainEncoding(_)
            | VlessError::MissingDestination
            | VlessError::AddonsEncodeError(_) => {
                io::Error::new(io::ErrorKind::InvalidInput, e.to_string())
            }
        }
    }
}
