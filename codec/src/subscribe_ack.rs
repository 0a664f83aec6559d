use crate::base::{DecodeBody, EncodeBody, PacketId};
use crate::byte_array::ByteArray;
use crate::error::{DecodeError, EncodeError};
use crate::header::{FixedHeader, PacketType, QoS};

/// Per-filter outcome of a SUBSCRIBE (MQTT-3.9.3).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubscribeAckReason {
    /// Granted, capped to the maximum QoS the broker is willing to support
    /// for this filter (may be lower than what was requested).
    Granted(QoS),
    /// The broker refuses the subscription, e.g. `NotAuthorized`.
    Failure,
}

impl From<SubscribeAckReason> for u8 {
    fn from(reason: SubscribeAckReason) -> Self {
        match reason {
            SubscribeAckReason::Granted(qos) => u8::from(qos),
            SubscribeAckReason::Failure => 0x80,
        }
    }
}

impl TryFrom<u8> for SubscribeAckReason {
    type Error = DecodeError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        if v == 0x80 {
            Ok(Self::Failure)
        } else {
            Ok(Self::Granted(QoS::try_from(v)?))
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscribeAckPacket {
    pub packet_id: PacketId,
    pub reasons: Vec<SubscribeAckReason>,
}

impl DecodeBody for SubscribeAckPacket {
    fn decode_body(ba: &mut ByteArray, _header: FixedHeader) -> Result<Self, DecodeError> {
        let packet_id = ba.read_u16()?;
        let mut reasons = Vec::new();
        while !ba.is_empty() {
            reasons.push(SubscribeAckReason::try_from(ba.read_byte()?)?);
        }
        Ok(Self { packet_id, reasons })
    }
}

impl EncodeBody for SubscribeAckPacket {
    fn packet_type(&self) -> PacketType {
        PacketType::SubscribeAck
    }

    fn encode_body(&self, buf: &mut Vec<u8>) -> Result<(), EncodeError> {
        buf.extend_from_slice(&self.packet_id.to_be_bytes());
        for reason in &self.reasons {
            buf.push(u8::from(*reason));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::encode_packet;

    #[test]
    fn encodes_and_decodes_mixed_reasons() {
        let packet = SubscribeAckPacket {
            packet_id: 9,
            reasons: vec![
                SubscribeAckReason::Granted(QoS::AtLeastOnce),
                SubscribeAckReason::Failure,
            ],
        };
        let mut buf = Vec::new();
        encode_packet(&packet, &mut buf).unwrap();

        let (header, header_len) = FixedHeader::peek(&buf).unwrap().unwrap();
        let mut ba = ByteArray::new(&buf[header_len..header_len + header.remaining_length()]);
        assert_eq!(SubscribeAckPacket::decode_body(&mut ba, header).unwrap(), packet);
    }
}
