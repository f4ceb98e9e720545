//! VLESS request addons
//!
//! Addons are a length-prefixed protobuf message. Only field 1, the flow
//! string, is understood; other fields are skipped when parsing.
//!
//! ```text
//! 0x12                      addons length (18)
//! 0x0a                      field 1, wire type 2
//! 0x10                      string length (16)
//! "xtls-rprx-origin"        16 bytes
//! ```

use super::error::VlessError;

/// Flow identifier selecting the enhanced-TLS (XTLS origin) variant
pub const XTLS_ORIGIN_FLOW: &str = "xtls-rprx-origin";

/// Field 1, wire type 2 (length-delimited)
const FLOW_FIELD_TAG: u8 = 0x0a;

/// Addons payload length is a single byte
const MAX_ADDONS_LEN: usize = u8::MAX as usize;

/// Addon fields carried in the request header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VlessAddons {
    /// Flow control identifier
    pub flow: Option<String>,
}

impl VlessAddons {
    /// Empty addons
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Addons carrying a flow
    #[must_use]
    pub fn with_flow(flow: impl Into<String>) -> Self {
        Self {
            flow: Some(flow.into()),
        }
    }

    /// Check if no field is set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.flow.is_none()
    }

    /// Check if the flow is `xtls-rprx-origin`
    #[must_use]
    pub fn is_xtls_origin(&self) -> bool {
        self.flow.as_deref() == Some(XTLS_ORIGIN_FLOW)
    }

    /// Encode with the leading length byte
    ///
    /// # Errors
    ///
    /// Returns `VlessError::AddonsEncodeError` if the payload exceeds 255 bytes.
    pub fn encode(&self) -> Result<Vec<u8>, VlessError> {
        let Some(flow) = &self.flow else {
            return Ok(vec![0]);
        };

        let mut payload = Vec::with_capacity(3 + flow.len());
        payload.push(FLOW_FIELD_TAG);
        put_varint(&mut payload, flow.len() as u64);
        payload.extend_from_slice(flow.as_bytes());

        let len = u8::try_from(payload.len()).map_err(|_| {
            VlessError::addons_encode(format!(
                "addons payload too large: {} bytes (max {MAX_ADDONS_LEN})",
                payload.len()
            ))
        })?;

        let mut out = Vec::with_capacity(1 + payload.len());
        out.push(len);
        out.extend(payload);
        Ok(out)
    }
}

/// Parse addons starting at the length byte
///
/// Returns the addons and the number of bytes consumed.
///
/// # Errors
///
/// Returns `VlessError::AddonsParseError` if the data is malformed.
pub fn parse_addons(data: &[u8]) -> Result<(VlessAddons, usize), VlessError> {
    let Some((&len, rest)) = data.split_first() else {
        return Err(VlessError::addons_parse("empty addons data"));
    };
    let len = usize::from(len);

    if len == 0 {
        return Ok((VlessAddons::new(), 1));
    }
    if rest.len() < len {
        return Err(VlessError::addons_parse(format!(
            "addons truncated: expected {len} bytes, got {}",
            rest.len()
        )));
    }

    let mut addons = VlessAddons::new();
    let mut payload = &rest[..len];

    while let Some((&tag, tail)) = payload.split_first() {
        payload = tail;
        let wire_type = tag & 0x07;

        payload = match (tag >> 3, wire_type) {
            (1, 2) => {
                let (value, tail) = take_length_delimited(payload)?;
                let flow = String::from_utf8(value.to_vec())
                    .map_err(|e| VlessError::addons_parse(format!("invalid UTF-8: {e}")))?;
                addons.flow = Some(flow);
                tail
            }
            (_, 0) => take_varint(payload)?.1,
            (_, 2) => take_length_delimited(payload)?.1,
            (_, 1) => skip(payload, 8)?,
            (_, 5) => skip(payload, 4)?,
            (_, wt) => {
                return Err(VlessError::addons_parse(format!(
                    "unsupported wire type: {wt}"
                )))
            }
        };
    }

    Ok((addons, 1 + len))
}

fn put_varint(buf: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        #[allow(clippy::cast_possible_truncation)]
        buf.push((value as u8) | 0x80);
        value >>= 7;
    }
    #[allow(clippy::cast_possible_truncation)]
    buf.push(value as u8);
}

fn take_varint(data: &[u8]) -> Result<(u64, &[u8]), VlessError> {
    let mut value = 0u64;
    for (i, &byte) in data.iter().enumerate().take(10) {
        value |= u64::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((value, &data[i + 1..]));
        }
    }
    Err(VlessError::addons_parse("malformed varint"))
}

fn take_length_delimited(data: &[u8]) -> Result<(&[u8], &[u8]), VlessError> {
    let (len, rest) = take_varint(data)?;
    let len = usize::try_from(len).map_err(|_| VlessError::addons_parse("length overflow"))?;
    if rest.len() < len {
        return Err(VlessError::addons_parse("truncated length-delimited field"));
    }
    Ok(rest.split_at(len))
}

fn skip(data: &[u8], n: usize) -> Result<&[u8], VlessError> {
    data.get(n..)
        .ok_or_else(|| VlessError::addons_parse("truncated fixed-width field"))
}
