// Fixed header shared by every MQTT control packet.
//
// ```txt
//  7 6 5 4 3 2 1 0
// +-------+-------+
// | Type  | Flags |
// +-------+-------+
// | Remaining Len |  (1-4 bytes)
// +-------+-------+
// ```

use std::convert::TryFrom;

use crate::byte_array::ByteArray;
use crate::error::{DecodeError, EncodeError};
use crate::var_int::RemainingLength;

/// Quality of service, totally ordered `AtMostOnce < AtLeastOnce < ExactlyOnce`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum QoS {
    #[default]
    AtMostOnce = 0,
    AtLeastOnce = 1,
    ExactlyOnce = 2,
}

impl TryFrom<u8> for QoS {
    type Error = DecodeError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Self::AtMostOnce),
            1 => Ok(Self::AtLeastOnce),
            2 => Ok(Self::ExactlyOnce),
            _ => Err(DecodeError::InvalidQoS),
        }
    }
}

impl From<QoS> for u8 {
    fn from(qos: QoS) -> Self {
        qos as u8
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PacketType {
    #[default]
    Connect,
    ConnectAck,
    Publish {
        dup: bool,
        qos: QoS,
        retain: bool,
    },
    PublishAck,
    PublishReceived,
    PublishRelease,
    PublishComplete,
    Subscribe,
    SubscribeAck,
    Unsubscribe,
    UnsubscribeAck,
    PingRequest,
    PingResponse,
    Disconnect,
}

impl From<PacketType> for u8 {
    fn from(packet_type: PacketType) -> Self {
        let type_bits: u8 = match packet_type {
            PacketType::Connect => 1,
            PacketType::ConnectAck => 2,
            PacketType::Publish { .. } => 3,
            PacketType::PublishAck => 4,
            PacketType::PublishReceived => 5,
            PacketType::PublishRelease => 6,
            PacketType::PublishComplete => 7,
            PacketType::Subscribe => 8,
            PacketType::SubscribeAck => 9,
            PacketType::Unsubscribe => 10,
            PacketType::UnsubscribeAck => 11,
            PacketType::PingRequest => 12,
            PacketType::PingResponse => 13,
            PacketType::Disconnect => 14,
        };
        let flag_bits: u8 = match packet_type {
            PacketType::Publish { dup, qos, retain } => {
                let dup = if dup { 0b1000 } else { 0 };
                let qos: u8 = u8::from(qos) << 1;
                let retain = u8::from(retain);
                dup | qos | retain
            }
            // MQTT-3.6.1-1 / MQTT-3.8.1-1 / MQTT-3.10.1-1: reserved bits fixed at 0b0010.
            PacketType::PublishRelease | PacketType::Subscribe | PacketType::Unsubscribe => 0b0010,
            _ => 0,
        };
        (type_bits << 4) | flag_bits
    }
}

impl TryFrom<u8> for PacketType {
    type Error = DecodeError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        let type_bits = (v & 0b1111_0000) >> 4;
        let flags = v & 0b0000_1111;
        match type_bits {
            1 if flags == 0 => Ok(Self::Connect),
            2 if flags == 0 => Ok(Self::ConnectAck),
            3 => {
                let dup = flags & 0b1000 != 0;
                let retain = flags & 0b0001 != 0;
                let qos = QoS::try_from((flags & 0b0110) >> 1)?;
                Ok(Self::Publish { dup, qos, retain })
            }
            4 if flags == 0 => Ok(Self::PublishAck),
            5 if flags == 0 => Ok(Self::PublishReceived),
            6 if flags == 0b0010 => Ok(Self::PublishRelease),
            7 if flags == 0 => Ok(Self::PublishComplete),
            8 if flags == 0b0010 => Ok(Self::Subscribe),
            9 if flags == 0 => Ok(Self::SubscribeAck),
            10 if flags == 0b0010 => Ok(Self::Unsubscribe),
            11 if flags == 0 => Ok(Self::UnsubscribeAck),
            12 if flags == 0 => Ok(Self::PingRequest),
            13 if flags == 0 => Ok(Self::PingResponse),
            14 if flags == 0 => Ok(Self::Disconnect),
            1..=14 => {
                log::error!("header: reserved flag bits set for type {type_bits}: {flags:#06b}");
                Err(DecodeError::InvalidPacketFlags)
            }
            _ => Err(DecodeError::InvalidPacketType),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FixedHeader {
    packet_type: PacketType,
    remaining_length: RemainingLength,
}

impl FixedHeader {
    /// # Errors
    /// Returns an error if `remaining_length` exceeds the wire limit.
    pub fn new(packet_type: PacketType, remaining_length: usize) -> Result<Self, EncodeError> {
        Ok(Self {
            packet_type,
            remaining_length: RemainingLength::new(remaining_length)?,
        })
    }

    #[must_use]
    pub const fn packet_type(&self) -> PacketType {
        self.packet_type
    }

    #[must_use]
    pub const fn remaining_length(&self) -> usize {
        self.remaining_length.value()
    }

    #[must_use]
    pub const fn bytes(&self) -> usize {
        1 + self.remaining_length.bytes()
    }

    /// Look at the head of `buf` and report the fixed header plus how many
    /// bytes it occupies, without requiring the rest of the packet to have
    /// arrived. Returns `Ok(None)` when `buf` doesn't yet hold a complete
    /// fixed header.
    ///
    /// # Errors
    /// Returns a `DecodeError` for a malformed header; never for a merely
    /// incomplete one (that case is `Ok(None)`).
    pub fn peek(buf: &[u8]) -> Result<Option<(Self, usize)>, DecodeError> {
        if buf.is_empty() {
            return Ok(None);
        }
        let packet_type = PacketType::try_from(buf[0])?;
        match RemainingLength::peek(&buf[1..])? {
            None => Ok(None),
            Some((remaining_length, len_bytes)) => Ok(Some((
                Self {
                    packet_type,
                    remaining_length,
                },
                1 + len_bytes,
            ))),
        }
    }

    pub fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let packet_type = PacketType::try_from(ba.read_byte()?)?;
        let remaining_length = RemainingLength::decode(ba)?;
        Ok(Self {
            packet_type,
            remaining_length,
        })
    }

    pub fn encode(&self, buf: &mut Vec<u8>) -> Result<(), EncodeError> {
        buf.push(self.packet_type.into());
        self.remaining_length.encode(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peek_then_decode_agree() {
        let buf = [0x30, 0x05, b'h', b'e', b'l', b'l', b'o'];
        let (peeked, header_len) = FixedHeader::peek(&buf).unwrap().unwrap();
        assert_eq!(header_len, 2);
        let mut ba = ByteArray::new(&buf);
        let decoded = FixedHeader::decode(&mut ba).unwrap();
        assert_eq!(peeked, decoded);
        assert_eq!(
            decoded.packet_type(),
            PacketType::Publish {
                dup: false,
                qos: QoS::AtMostOnce,
                retain: false
            }
        );
        assert_eq!(decoded.remaining_length(), 5);
    }

    #[test]
    fn peek_waits_for_more_bytes() {
        // Type byte present, remaining-length byte not yet arrived.
        assert_eq!(FixedHeader::peek(&[0x30]).unwrap(), None);
    }

    #[test]
    fn rejects_bad_subscribe_flags() {
        assert_eq!(
            PacketType::try_from(0b1000_0000),
            Err(DecodeError::InvalidPacketFlags)
        );
    }
}
