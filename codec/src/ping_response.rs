use crate::base::{DecodeBody, EncodeBody};
use crate::byte_array::ByteArray;
use crate::error::{DecodeError, EncodeError};
use crate::header::{FixedHeader, PacketType};

/// Reply to `PingRequestPacket`; carries no variable header or payload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PingResponsePacket;

impl DecodeBody for PingResponsePacket {
    fn decode_body(_ba: &mut ByteArray, _header: FixedHeader) -> Result<Self, DecodeError> {
        Ok(Self)
    }
}

impl EncodeBody for PingResponsePacket {
    fn packet_type(&self) -> PacketType {
        PacketType::PingResponse
    }

    fn encode_body(&self, _buf: &mut Vec<u8>) -> Result<(), EncodeError> {
        Ok(())
    }
}
