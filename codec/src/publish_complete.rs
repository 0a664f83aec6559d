use crate::base::{DecodeBody, EncodeBody, PacketId};
use crate::byte_array::ByteArray;
use crate::error::{DecodeError, EncodeError};
use crate::header::{FixedHeader, PacketType};

/// Closes out the QoS 2 handshake, sent in reply to PUBREL.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PublishCompletePacket {
    pub packet_id: PacketId,
}

impl DecodeBody for PublishCompletePacket {
    fn decode_body(ba: &mut ByteArray, _header: FixedHeader) -> Result<Self, DecodeError> {
        Ok(Self {
            packet_id: ba.read_u16()?,
        })
    }
}

impl EncodeBody for PublishCompletePacket {
    fn packet_type(&self) -> PacketType {
        PacketType::PublishComplete
    }

    fn encode_body(&self, buf: &mut Vec<u8>) -> Result<(), EncodeError> {
        buf.extend_from_slice(&self.packet_id.to_be_bytes());
        Ok(())
    }
}
