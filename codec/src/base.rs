// Shared packet-level traits. Every concrete packet type encodes/decodes
// its variable header and payload through these; the fixed header
// (control byte + remaining length) is handled once by `Packet::encode`
// and by the framing layer, not duplicated per packet type.

use crate::byte_array::ByteArray;
use crate::error::{DecodeError, EncodeError};
use crate::header::{FixedHeader, PacketType};

/// Packet identifier used to correlate PUBLISH (QoS > 0) with its
/// acknowledgement packets, and SUBSCRIBE/UNSUBSCRIBE with their ACKs.
pub type PacketId = u16;

pub trait DecodeBody: Sized {
    /// Decode this packet's variable header and payload. `header` has
    /// already been consumed from the stream; `ba` is scoped to exactly
    /// `header.remaining_length()` bytes.
    fn decode_body(ba: &mut ByteArray, header: FixedHeader) -> Result<Self, DecodeError>;
}

pub trait EncodeBody {
    fn packet_type(&self) -> PacketType;
    fn encode_body(&self, buf: &mut Vec<u8>) -> Result<(), EncodeError>;
}

/// Encode a full packet (fixed header + body) onto `buf`.
///
/// # Errors
/// Returns `EncodeError::InvalidVarInt` if the body is larger than the
/// 256MB remaining-length limit.
pub fn encode_packet<P: EncodeBody>(packet: &P, buf: &mut Vec<u8>) -> Result<(), EncodeError> {
    let mut body = Vec::new();
    packet.encode_body(&mut body)?;
    let header = FixedHeader::new(packet.packet_type(), body.len())?;
    header.encode(buf)?;
    buf.extend_from_slice(&body);
    Ok(())
}
