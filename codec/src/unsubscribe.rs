use crate::base::{DecodeBody, EncodeBody, PacketId};
use crate::byte_array::ByteArray;
use crate::connect::write_string;
use crate::error::{DecodeError, EncodeError};
use crate::header::{FixedHeader, PacketType};
use crate::topic::{parse_filter, Filter};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnsubscribePacket {
    pub packet_id: PacketId,
    pub filters: Vec<Filter>,
}

impl DecodeBody for UnsubscribePacket {
    fn decode_body(ba: &mut ByteArray, _header: FixedHeader) -> Result<Self, DecodeError> {
        let packet_id = ba.read_u16()?;
        let mut filters = Vec::new();
        while !ba.is_empty() {
            filters.push(parse_filter(ba.read_string()?)?);
        }
        if filters.is_empty() {
            // MQTT-3.10.3-2: an UNSUBSCRIBE must carry at least one filter.
            return Err(DecodeError::InvalidFilter);
        }
        Ok(Self { packet_id, filters })
    }
}

impl EncodeBody for UnsubscribePacket {
    fn packet_type(&self) -> PacketType {
        PacketType::Unsubscribe
    }

    fn encode_body(&self, buf: &mut Vec<u8>) -> Result<(), EncodeError> {
        buf.extend_from_slice(&self.packet_id.to_be_bytes());
        for filter in &self.filters {
            write_string(buf, &filter.to_string())?;
        }
        Ok(())
    }
}
