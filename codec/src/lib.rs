//! Packet codec for MQTT v3.1.1: fixed header, variable-length integer,
//! per-packet-type bodies, topic/filter grammar, and the incremental
//! frame parser the broker's transport layer drives.
//!
//! This crate only knows how to turn bytes into packets and back; it has
//! no notion of sessions, subscriptions or I/O.

pub mod base;
pub mod byte_array;
pub mod connect;
pub mod connect_ack;
pub mod disconnect;
pub mod error;
pub mod frame;
pub mod header;
pub mod ping_request;
pub mod ping_response;
pub mod publish;
pub mod publish_ack;
pub mod publish_complete;
pub mod publish_received;
pub mod publish_release;
pub mod subscribe;
pub mod subscribe_ack;
pub mod topic;
pub mod unsubscribe;
pub mod unsubscribe_ack;
pub mod var_int;

pub use base::{DecodeBody, EncodeBody, PacketId};
pub use byte_array::ByteArray;
pub use connect::{ConnectPacket, LastWill, ProtocolLevel};
pub use connect_ack::{ConnectAckPacket, ConnectReturnCode};
pub use disconnect::DisconnectPacket;
pub use error::{DecodeError, EncodeError};
pub use frame::Packet;
pub use header::{FixedHeader, PacketType, QoS};
pub use ping_request::PingRequestPacket;
pub use ping_response::PingResponsePacket;
pub use publish::PublishPacket;
pub use publish_ack::PublishAckPacket;
pub use publish_complete::PublishCompletePacket;
pub use publish_received::PublishReceivedPacket;
pub use publish_release::PublishReleasePacket;
pub use subscribe::{SubscribePacket, SubscribeTopic};
pub use subscribe_ack::{SubscribeAckPacket, SubscribeAckReason};
pub use topic::{parse_filter, parse_topic, Filter, FilterLevel, Level, Topic};
pub use unsubscribe::UnsubscribePacket;
pub use unsubscribe_ack::UnsubscribeAckPacket;
pub use var_int::RemainingLength;
