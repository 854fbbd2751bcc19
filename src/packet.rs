//! Wire-format framing for the tracker protocol.
//!
//! Every unit exchanged on the wire is a [`Packet`]:
//!
//! ```text
//! +--------------+------------------+----------------+------------------+
//! | Header (2B)  | Protocol ID (1B) | Length (2B BE) | Payload (N bytes)|
//! +--------------+------------------+----------------+------------------+
//! ```
//!
//! The header is opaque and passed through unmodified. The length field is
//! an unsigned big-endian 16-bit payload byte count, so a packet carries at
//! most 65535 payload bytes and a zero-length payload is valid.

use crate::error::{RelayError, Result};
use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Protocol id for GPS telemetry frames. Fire-and-forget; never answered.
pub const PROTOCOL_GPS: u8 = 0x02;
/// Protocol id for ordinary device messages. Fire-and-forget; never answered.
pub const PROTOCOL_ORDINARY_MESSAGE: u8 = 0x81;

/// Byte length of the fixed part of a packet: header + protocol id + length.
pub const PREFIX_LEN: usize = 5;

const OFF_PROTOCOL: usize = 2;

/// One fully framed unit of the wire protocol.
///
/// A `Packet` is only ever constructed whole — either framed off a stream by
/// [`read_packet`] or assembled by [`Packet::from_parts`] — so the length
/// field always matches the payload it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    raw: Bytes,
}

impl Packet {
    /// Assemble a packet from its parts, computing the length field.
    ///
    /// Returns `None` if `payload` exceeds the 65535-byte limit of the
    /// 16-bit length field.
    pub fn from_parts(header: [u8; 2], protocol: u8, payload: &[u8]) -> Option<Packet> {
        let len = u16::try_from(payload.len()).ok()?;
        let mut raw = BytesMut::with_capacity(PREFIX_LEN + payload.len());
        raw.put_slice(&header);
        raw.put_u8(protocol);
        raw.put_u16(len);
        raw.put_slice(payload);
        Some(Packet { raw: raw.freeze() })
    }

    /// The opaque 2-byte header.
    pub fn header(&self) -> &[u8] {
        &self.raw[..OFF_PROTOCOL]
    }

    /// The protocol id tag.
    pub fn protocol(&self) -> u8 {
        self.raw[OFF_PROTOCOL]
    }

    /// The payload bytes (may be empty).
    pub fn payload(&self) -> &[u8] {
        &self.raw[PREFIX_LEN..]
    }

    /// The full framed bytes, exactly as read off or written to the wire.
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// Whether the privileged downstream is expected to answer this packet.
    ///
    /// GPS and ordinary-message traffic is broadcast-only; every other
    /// protocol id is command traffic that solicits a reply.
    pub fn expects_reply(&self) -> bool {
        !matches!(self.protocol(), PROTOCOL_GPS | PROTOCOL_ORDINARY_MESSAGE)
    }

    /// Uppercase hex rendering of the full packet, for debug logs.
    pub fn hex(&self) -> String {
        self.raw.iter().map(|b| format!("{b:02X}")).collect()
    }
}

fn framing(field: &'static str) -> impl FnOnce(std::io::Error) -> RelayError {
    move |source| RelayError::Framing { field, source }
}

/// Frame one [`Packet`] off `r`.
///
/// Reads the 2-byte header, the protocol id, the big-endian length, then
/// exactly that many payload bytes. Each read loops until the requested byte
/// count is satisfied; a stream that ends mid-field surfaces as
/// [`RelayError::Framing`], never as a truncated packet.
pub async fn read_packet<R>(r: &mut R) -> Result<Packet>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; 2];
    r.read_exact(&mut header).await.map_err(framing("header"))?;
    let protocol = r.read_u8().await.map_err(framing("protocol id"))?;
    let len = r.read_u16().await.map_err(framing("length"))?;

    let mut raw = BytesMut::with_capacity(PREFIX_LEN + len as usize);
    raw.put_slice(&header);
    raw.put_u8(protocol);
    raw.put_u16(len);
    raw.resize(PREFIX_LEN + len as usize, 0);
    r.read_exact(&mut raw[PREFIX_LEN..])
        .await
        .map_err(framing("payload"))?;
    Ok(Packet { raw: raw.freeze() })
}
