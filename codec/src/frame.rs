//! Packet enum and incremental framing.
//!
//! `Packet::peek_len` / `Packet::decode` let a transport read arbitrarily
//! small chunks off a socket and only attempt a decode once a full frame
//! (fixed header + remaining length worth of body) has accumulated in its
//! buffer. See `broker::transport::mqtt` for the driver loop.

use crate::base::{encode_packet, DecodeBody, EncodeBody};
use crate::byte_array::ByteArray;
use crate::connect::ConnectPacket;
use crate::connect_ack::ConnectAckPacket;
use crate::disconnect::DisconnectPacket;
use crate::error::{DecodeError, EncodeError};
use crate::header::{FixedHeader, PacketType};
use crate::ping_request::PingRequestPacket;
use crate::ping_response::PingResponsePacket;
use crate::publish::PublishPacket;
use crate::publish_ack::PublishAckPacket;
use crate::publish_complete::PublishCompletePacket;
use crate::publish_received::PublishReceivedPacket;
use crate::publish_release::PublishReleasePacket;
use crate::subscribe::SubscribePacket;
use crate::subscribe_ack::SubscribeAckPacket;
use crate::unsubscribe::UnsubscribePacket;
use crate::unsubscribe_ack::UnsubscribeAckPacket;

/// Any decoded MQTT control packet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Packet {
    Connect(ConnectPacket),
    ConnectAck(ConnectAckPacket),
    Publish(PublishPacket),
    PublishAck(PublishAckPacket),
    PublishReceived(PublishReceivedPacket),
    PublishRelease(PublishReleasePacket),
    PublishComplete(PublishCompletePacket),
    Subscribe(SubscribePacket),
    SubscribeAck(SubscribeAckPacket),
    Unsubscribe(UnsubscribePacket),
    UnsubscribeAck(UnsubscribeAckPacket),
    PingRequest(PingRequestPacket),
    PingResponse(PingResponsePacket),
    Disconnect(DisconnectPacket),
}

impl Packet {
    /// Look at the head of `buf` and report how many bytes the next full
    /// frame will take, without requiring those bytes to have arrived.
    /// Returns `Ok(None)` when `buf` doesn't yet hold a complete fixed
    /// header (so the total frame length itself isn't known yet).
    ///
    /// # Errors
    /// Returns a `DecodeError` if the fixed header is malformed.
    pub fn peek_len(buf: &[u8]) -> Result<Option<usize>, DecodeError> {
        match FixedHeader::peek(buf)? {
            None => Ok(None),
            Some((header, header_len)) => Ok(Some(header_len + header.remaining_length())),
        }
    }

    /// Decode exactly one frame from `buf`, which must hold exactly
    /// `peek_len(buf)` bytes (no more, no less): callers slice precisely
    /// that many bytes off their read buffer before calling this.
    ///
    /// # Errors
    /// Returns a `DecodeError` if the header or body is malformed, or if
    /// the body decoder did not consume the entire frame.
    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        let mut ba = ByteArray::new(buf);
        let header = FixedHeader::decode(&mut ba)?;
        let body_start = ba.offset();
        let body = &buf[body_start..body_start + header.remaining_length()];
        let mut body_ba = ByteArray::new(body);

        let packet = match header.packet_type() {
            PacketType::Connect => {
                Self::Connect(ConnectPacket::decode_body(&mut body_ba, header)?)
            }
            PacketType::ConnectAck => {
                Self::ConnectAck(ConnectAckPacket::decode_body(&mut body_ba, header)?)
            }
            PacketType::Publish { .. } => {
                Self::Publish(PublishPacket::decode_body(&mut body_ba, header)?)
            }
            PacketType::PublishAck => {
                Self::PublishAck(PublishAckPacket::decode_body(&mut body_ba, header)?)
            }
            PacketType::PublishReceived => Self::PublishReceived(
                PublishReceivedPacket::decode_body(&mut body_ba, header)?,
            ),
            PacketType::PublishRelease => {
                Self::PublishRelease(PublishReleasePacket::decode_body(&mut body_ba, header)?)
            }
            PacketType::PublishComplete => Self::PublishComplete(
                PublishCompletePacket::decode_body(&mut body_ba, header)?,
            ),
            PacketType::Subscribe => {
                Self::Subscribe(SubscribePacket::decode_body(&mut body_ba, header)?)
            }
            PacketType::SubscribeAck => {
                Self::SubscribeAck(SubscribeAckPacket::decode_body(&mut body_ba, header)?)
            }
            PacketType::Unsubscribe => {
                Self::Unsubscribe(UnsubscribePacket::decode_body(&mut body_ba, header)?)
            }
            PacketType::UnsubscribeAck => Self::UnsubscribeAck(
                UnsubscribeAckPacket::decode_body(&mut body_ba, header)?,
            ),
            PacketType::PingRequest => {
                Self::PingRequest(PingRequestPacket::decode_body(&mut body_ba, header)?)
            }
            PacketType::PingResponse => {
                Self::PingResponse(PingResponsePacket::decode_body(&mut body_ba, header)?)
            }
            PacketType::Disconnect => {
                Self::Disconnect(DisconnectPacket::decode_body(&mut body_ba, header)?)
            }
        };

        if body_ba.remaining_bytes() != 0 {
            log::error!(
                "frame: {} trailing bytes left over after decoding {:?}",
                body_ba.remaining_bytes(),
                header.packet_type()
            );
            return Err(DecodeError::InvalidRemainingLength);
        }
        Ok(packet)
    }

    /// Encode this packet's fixed header and body onto `buf`.
    ///
    /// # Errors
    /// Returns an `EncodeError` if the body exceeds the 256MB remaining
    /// length limit or a field exceeds the 16-bit length-prefix limit.
    pub fn encode(&self, buf: &mut Vec<u8>) -> Result<(), EncodeError> {
        match self {
            Self::Connect(p) => encode_packet(p, buf),
            Self::ConnectAck(p) => encode_packet(p, buf),
            Self::Publish(p) => encode_packet(p, buf),
            Self::PublishAck(p) => encode_packet(p, buf),
            Self::PublishReceived(p) => encode_packet(p, buf),
            Self::PublishRelease(p) => encode_packet(p, buf),
            Self::PublishComplete(p) => encode_packet(p, buf),
            Self::Subscribe(p) => encode_packet(p, buf),
            Self::SubscribeAck(p) => encode_packet(p, buf),
            Self::Unsubscribe(p) => encode_packet(p, buf),
            Self::UnsubscribeAck(p) => encode_packet(p, buf),
            Self::PingRequest(p) => encode_packet(p, buf),
            Self::PingResponse(p) => encode_packet(p, buf),
            Self::Disconnect(p) => encode_packet(p, buf),
        }
    }

    #[must_use]
    pub fn packet_type(&self) -> PacketType {
        match self {
            Self::Connect(p) => p.packet_type(),
            Self::ConnectAck(p) => p.packet_type(),
            Self::Publish(p) => p.packet_type(),
            Self::PublishAck(p) => p.packet_type(),
            Self::PublishReceived(p) => p.packet_type(),
            Self::PublishRelease(p) => p.packet_type(),
            Self::PublishComplete(p) => p.packet_type(),
            Self::Subscribe(p) => p.packet_type(),
            Self::SubscribeAck(p) => p.packet_type(),
            Self::Unsubscribe(p) => p.packet_type(),
            Self::UnsubscribeAck(p) => p.packet_type(),
            Self::PingRequest(p) => p.packet_type(),
            Self::PingResponse(p) => p.packet_type(),
            Self::Disconnect(p) => p.packet_type(),
        }
    }
}
