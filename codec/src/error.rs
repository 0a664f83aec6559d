// Error types returned by packet decoding and encoding.

use std::fmt;

/// Errors raised while decoding bytes into a packet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecodeError {
    /// The buffer does not yet hold enough bytes to finish decoding.
    ///
    /// Callers driving an incremental parser (see `broker::transport::mqtt`)
    /// treat this variant specially: it means "come back with more bytes",
    /// not "the bytes seen so far are invalid".
    Incomplete,

    /// Packet type / flag bits did not match any known combination.
    InvalidPacketType,

    /// Reserved flag bits in the fixed header were non-zero where MQTT-2.2.2
    /// requires them to be zero (or, for PUBREL/SUBSCRIBE/UNSUBSCRIBE, one).
    InvalidPacketFlags,

    /// `Remaining Length` variable-byte-integer exceeded the 4-byte/256MB
    /// limit defined by MQTT-1.5.5-1.
    InvalidVarInt,

    /// QoS bits did not decode to 0, 1 or 2.
    InvalidQoS,

    /// Protocol level byte was not 3, 4 or 5.
    InvalidProtocolLevel,

    /// Protocol name in CONNECT was not the literal string `MQTT` (or the
    /// v3.1 `MQIsdp`).
    InvalidProtocolName,

    /// A length-prefixed string was not valid UTF-8.
    InvalidString,

    /// A topic or filter failed the level grammar in `topic` module.
    InvalidTopic,
    InvalidFilter,

    /// Remaining length field claimed fewer or more bytes than the body
    /// actually decoded.
    InvalidRemainingLength,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl std::error::Error for DecodeError {}

/// Errors raised while encoding a packet into bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EncodeError {
    /// Remaining length would exceed the 256MB limit.
    InvalidVarInt,

    /// A string or binary field is longer than the 16-bit length prefix
    /// can represent.
    TooManyData,
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl std::error::Error for EncodeError {}
