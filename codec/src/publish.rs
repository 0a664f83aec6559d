use crate::base::{DecodeBody, EncodeBody, PacketId};
use crate::byte_array::ByteArray;
use crate::connect::write_string;
use crate::error::{DecodeError, EncodeError};
use crate::header::{FixedHeader, PacketType, QoS};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishPacket {
    pub dup: bool,
    pub qos: QoS,
    pub retain: bool,
    pub topic: String,
    /// Present iff `qos != AtMostOnce` (MQTT-2.3.1-5).
    pub packet_id: Option<PacketId>,
    pub payload: Vec<u8>,
}

impl DecodeBody for PublishPacket {
    fn decode_body(ba: &mut ByteArray, header: FixedHeader) -> Result<Self, DecodeError> {
        let PacketType::Publish { dup, qos, retain } = header.packet_type() else {
            unreachable!("frame dispatch guarantees a Publish fixed header")
        };
        let topic = ba.read_string()?.to_string();
        let packet_id = if qos == QoS::AtMostOnce {
            None
        } else {
            Some(ba.read_u16()?)
        };
        let payload = ba.read_remaining().to_vec();
        Ok(Self {
            dup,
            qos,
            retain,
            topic,
            packet_id,
            payload,
        })
    }
}

impl EncodeBody for PublishPacket {
    fn packet_type(&self) -> PacketType {
        PacketType::Publish {
            dup: self.dup,
            qos: self.qos,
            retain: self.retain,
        }
    }

    fn encode_body(&self, buf: &mut Vec<u8>) -> Result<(), EncodeError> {
        write_string(buf, &self.topic)?;
        if self.qos != QoS::AtMostOnce {
            let packet_id = self
                .packet_id
                .expect("packet_id is required for qos > 0 publishes");
            buf.extend_from_slice(&packet_id.to_be_bytes());
        }
        buf.extend_from_slice(&self.payload);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::encode_packet;

    #[test]
    fn encodes_and_decodes_qos1_publish() {
        let packet = PublishPacket {
            dup: false,
            qos: QoS::AtLeastOnce,
            retain: false,
            topic: "a/b".to_string(),
            packet_id: Some(42),
            payload: b"hello".to_vec(),
        };
        let mut buf = Vec::new();
        encode_packet(&packet, &mut buf).unwrap();

        let (header, header_len) = FixedHeader::peek(&buf).unwrap().unwrap();
        let mut ba = ByteArray::new(&buf[header_len..header_len + header.remaining_length()]);
        let decoded = PublishPacket::decode_body(&mut ba, header).unwrap();
        assert_eq!(decoded, packet);
    }
}
