use crate::base::{DecodeBody, EncodeBody, PacketId};
use crate::byte_array::ByteArray;
use crate::connect::write_string;
use crate::error::{DecodeError, EncodeError};
use crate::header::{FixedHeader, PacketType, QoS};
use crate::topic::{parse_filter, Filter};

/// One filter/QoS pair as carried on the wire (MQTT-3.8.3).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscribeTopic {
    pub filter: Filter,
    pub qos: QoS,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscribePacket {
    pub packet_id: PacketId,
    pub topics: Vec<SubscribeTopic>,
}

impl DecodeBody for SubscribePacket {
    fn decode_body(ba: &mut ByteArray, _header: FixedHeader) -> Result<Self, DecodeError> {
        let packet_id = ba.read_u16()?;
        let mut topics = Vec::new();
        while !ba.is_empty() {
            let filter = parse_filter(ba.read_string()?)?;
            let qos = QoS::try_from(ba.read_byte()? & 0b0000_0011)?;
            topics.push(SubscribeTopic { filter, qos });
        }
        if topics.is_empty() {
            // MQTT-3.8.3-3: a SUBSCRIBE must carry at least one filter.
            return Err(DecodeError::InvalidFilter);
        }
        Ok(Self { packet_id, topics })
    }
}

impl EncodeBody for SubscribePacket {
    fn packet_type(&self) -> PacketType {
        PacketType::Subscribe
    }

    fn encode_body(&self, buf: &mut Vec<u8>) -> Result<(), EncodeError> {
        buf.extend_from_slice(&self.packet_id.to_be_bytes());
        for topic in &self.topics {
            write_string(buf, &topic.filter.to_string())?;
            buf.push(u8::from(topic.qos));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::encode_packet;

    #[test]
    fn encodes_and_decodes_multiple_filters() {
        let packet = SubscribePacket {
            packet_id: 7,
            topics: vec![
                SubscribeTopic {
                    filter: parse_filter("a/+").unwrap(),
                    qos: QoS::AtLeastOnce,
                },
                SubscribeTopic {
                    filter: parse_filter("a/#").unwrap(),
                    qos: QoS::ExactlyOnce,
                },
            ],
        };
        let mut buf = Vec::new();
        encode_packet(&packet, &mut buf).unwrap();

        let (header, header_len) = FixedHeader::peek(&buf).unwrap().unwrap();
        let mut ba = ByteArray::new(&buf[header_len..header_len + header.remaining_length()]);
        let decoded = SubscribePacket::decode_body(&mut ba, header).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn rejects_empty_subscribe() {
        let mut ba = ByteArray::new(&[0x00, 0x07]);
        let header = FixedHeader::new(PacketType::Subscribe, 2).unwrap();
        assert_eq!(
            SubscribePacket::decode_body(&mut ba, header),
            Err(DecodeError::InvalidFilter)
        );
    }
}
