use crate::base::{DecodeBody, EncodeBody, PacketId};
use crate::byte_array::ByteArray;
use crate::error::{DecodeError, EncodeError};
use crate::header::{FixedHeader, PacketType};

/// First half of the QoS 2 handshake: acknowledges receipt of PUBLISH.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PublishReceivedPacket {
    pub packet_id: PacketId,
}

impl DecodeBody for PublishReceivedPacket {
    fn decode_body(ba: &mut ByteArray, _header: FixedHeader) -> Result<Self, DecodeError> {
        Ok(Self {
            packet_id: ba.read_u16()?,
        })
    }
}

impl EncodeBody for PublishReceivedPacket {
    fn packet_type(&self) -> PacketType {
        PacketType::PublishReceived
    }

    fn encode_body(&self, buf: &mut Vec<u8>) -> Result<(), EncodeError> {
        buf.extend_from_slice(&self.packet_id.to_be_bytes());
        Ok(())
    }
}
