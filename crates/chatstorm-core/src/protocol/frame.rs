//! Frame codec (panic-free).
//!
//! Wire variants:
//! - `hex-length`: 4 ASCII hex digits carrying the body length, then the body.
//!   A body of exactly `-` is a heartbeat probe answered with `{}`.
//! - `binary-length`: 4-byte big-endian length, then the body.
//! - `transport-native`: no header; the transport delivers whole messages.
//!
//! Parsing rules:
//! - Never index (`buf[0]`); use `Buf`, `get` and `remaining()` checks.
//! - A header that is not a valid length is fatal (`HarnessError::Framing`):
//!   the body length is unknown, so every later frame boundary would be wrong.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::{HarnessError, Result};

/// Header size for the length-prefixed variants.
pub const HEADER_LEN: usize = 4;

/// Largest body a 4-hex-digit header can describe.
pub const HEX_MAX_BODY: usize = 0xFFFF;

/// Heartbeat probe body (hex variant only).
pub const HEARTBEAT_PROBE: &[u8] = b"-";

/// Heartbeat reply body (hex variant only).
pub const HEARTBEAT_REPLY: &[u8] = b"{}";

/// Wire framing variant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WireVariant {
    #[default]
    HexLength,
    BinaryLength,
    TransportNative,
}

/// One decoded inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    /// Keepalive probe; the receiver must answer with [`HEARTBEAT_REPLY`].
    Heartbeat,
    /// JSON body (not yet parsed).
    Body(Bytes),
}

impl WireVariant {
    pub fn as_str(self) -> &'static str {
        match self {
            WireVariant::HexLength => "hex-length",
            WireVariant::BinaryLength => "binary-length",
            WireVariant::TransportNative => "transport-native",
        }
    }

    /// Header bytes preceding every body (0 for transport-native).
    pub fn header_len(self) -> usize {
        match self {
            WireVariant::HexLength | WireVariant::BinaryLength => HEADER_LEN,
            WireVariant::TransportNative => 0,
        }
    }

    /// Largest body this variant can represent.
    pub fn max_body_len(self) -> usize {
        match self {
            WireVariant::HexLength => HEX_MAX_BODY,
            WireVariant::BinaryLength => u32::MAX as usize,
            WireVariant::TransportNative => usize::MAX,
        }
    }

    pub fn has_heartbeat(self) -> bool {
        matches!(self, WireVariant::HexLength)
    }

    /// Prefix `body` with this variant's header.
    pub fn encode(self, body: &[u8]) -> Result<Bytes> {
        let max = self.max_body_len();
        if body.len() > max {
            return Err(HarnessError::FrameTooLarge {
                len: body.len(),
                max,
            });
        }

        let mut out = BytesMut::with_capacity(self.header_len() + body.len());
        match self {
            WireVariant::HexLength => {
                out.put_slice(format!("{:04x}", body.len()).as_bytes());
            }
            WireVariant::BinaryLength => {
                // bounded by max_body_len above
                out.put_u32(body.len() as u32);
            }
            WireVariant::TransportNative => {}
        }
        out.put_slice(body);
        Ok(out.freeze())
    }

    /// Parse a 4-byte header into a body length.
    pub fn parse_header(self, header: &[u8]) -> Result<usize> {
        if header.len() != HEADER_LEN {
            return Err(HarnessError::Framing(format!(
                "header must be {HEADER_LEN} bytes, got {}",
                header.len()
            )));
        }

        match self {
            WireVariant::HexLength => {
                // `from_str_radix` tolerates a leading '+'; the wire format does not.
                if !header.iter().all(u8::is_ascii_hexdigit) {
                    return Err(HarnessError::Framing(format!(
                        "invalid hex length header {:?}",
                        String::from_utf8_lossy(header)
                    )));
                }
                let s = std::str::from_utf8(header)
                    .map_err(|e| HarnessError::Framing(format!("header not ascii: {e}")))?;
                let len = u16::from_str_radix(s, 16)
                    .map_err(|e| HarnessError::Framing(format!("invalid hex length: {e}")))?;
                Ok(len as usize)
            }
            WireVariant::BinaryLength => {
                let mut buf = header;
                Ok(buf.get_u32() as usize)
            }
            WireVariant::TransportNative => Err(HarnessError::Framing(
                "transport-native frames carry no header".into(),
            )),
        }
    }

    /// Parse a header and enforce the receive limit. Shared by the
    /// incremental decoder and the streaming readers.
    pub fn checked_body_len(self, header: &[u8], max_body: usize) -> Result<usize> {
        let len = self.parse_header(header)?;
        if len > max_body {
            return Err(HarnessError::Framing(format!(
                "declared length {len} exceeds limit {max_body}"
            )));
        }
        Ok(len)
    }

    /// Distinguish a heartbeat probe from a regular body.
    pub fn classify(self, body: Bytes) -> InboundFrame {
        if self.has_heartbeat() && body.as_ref() == HEARTBEAT_PROBE {
            InboundFrame::Heartbeat
        } else {
            InboundFrame::Body(body)
        }
    }

    /// Incremental decoder over an accumulation buffer.
    ///
    /// Returns `Ok(None)` while the buffer holds less than one full frame; on
    /// success the frame is split off the front of `buf`. For
    /// transport-native framing the whole buffer is one message.
    pub fn decode(self, buf: &mut BytesMut, max_body: usize) -> Result<Option<InboundFrame>> {
        if self == WireVariant::TransportNative {
            if !buf.has_remaining() {
                return Ok(None);
            }
            let body = buf.split().freeze();
            return Ok(Some(self.classify(body)));
        }

        let Some(header) = buf.get(..HEADER_LEN) else {
            return Ok(None);
        };

        let len = self.checked_body_len(header, max_body)?;
        if buf.remaining() < HEADER_LEN + len {
            return Ok(None);
        }

        buf.advance(HEADER_LEN);
        let body = buf.split_to(len).freeze();
        Ok(Some(self.classify(body)))
    }
}
