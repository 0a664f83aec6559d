use crate::base::{DecodeBody, EncodeBody};
use crate::byte_array::ByteArray;
use crate::error::{DecodeError, EncodeError};
use crate::header::{FixedHeader, PacketType};

/// Keepalive probe sent by the client; carries no variable header or payload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PingRequestPacket;

impl DecodeBody for PingRequestPacket {
    fn decode_body(_ba: &mut ByteArray, _header: FixedHeader) -> Result<Self, DecodeError> {
        Ok(Self)
    }
}

impl EncodeBody for PingRequestPacket {
    fn packet_type(&self) -> PacketType {
        PacketType::PingRequest
    }

    fn encode_body(&self, _buf: &mut Vec<u8>) -> Result<(), EncodeError> {
        Ok(())
    }
}
