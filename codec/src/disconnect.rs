use crate::base::{DecodeBody, EncodeBody};
use crate::byte_array::ByteArray;
use crate::error::{DecodeError, EncodeError};
use crate::header::{FixedHeader, PacketType};

/// Graceful session termination notice; carries no variable header or
/// payload. Receiving this tells the broker to discard the connection's
/// last will without publishing it (MQTT-3.1.2-10).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DisconnectPacket;

impl DecodeBody for DisconnectPacket {
    fn decode_body(_ba: &mut ByteArray, _header: FixedHeader) -> Result<Self, DecodeError> {
        Ok(Self)
    }
}

impl EncodeBody for DisconnectPacket {
    fn packet_type(&self) -> PacketType {
        PacketType::Disconnect
    }

    fn encode_body(&self, _buf: &mut Vec<u8>) -> Result<(), EncodeError> {
        Ok(())
    }
}
