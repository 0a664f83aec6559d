use crate::base::{DecodeBody, EncodeBody, PacketId};
use crate::byte_array::ByteArray;
use crate::error::{DecodeError, EncodeError};
use crate::header::{FixedHeader, PacketType};

/// Acknowledges a QoS 1 PUBLISH.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PublishAckPacket {
    pub packet_id: PacketId,
}

impl DecodeBody for PublishAckPacket {
    fn decode_body(ba: &mut ByteArray, _header: FixedHeader) -> Result<Self, DecodeError> {
        Ok(Self {
            packet_id: ba.read_u16()?,
        })
    }
}

impl EncodeBody for PublishAckPacket {
    fn packet_type(&self) -> PacketType {
        PacketType::PublishAck
    }

    fn encode_body(&self, buf: &mut Vec<u8>) -> Result<(), EncodeError> {
        buf.extend_from_slice(&self.packet_id.to_be_bytes());
        Ok(())
    }
}
