use std::convert::TryFrom;

use crate::base::{DecodeBody, EncodeBody};
use crate::byte_array::ByteArray;
use crate::error::{DecodeError, EncodeError};
use crate::header::{FixedHeader, PacketType, QoS};

/// MQTT protocol level. Only v3.1.1 is accepted by this broker core; v3.1
/// and v5 connect attempts are rejected with `ConnectReturnCode::UnacceptableProtocolVersion`
/// (v5 support is a stated Non-goal).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProtocolLevel {
    V311 = 4,
}

impl TryFrom<u8> for ProtocolLevel {
    type Error = DecodeError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            4 => Ok(Self::V311),
            _ => Err(DecodeError::InvalidProtocolLevel),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LastWill {
    pub topic: String,
    pub message: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectPacket {
    pub protocol_level: ProtocolLevel,
    pub client_id: String,
    pub clean_session: bool,
    pub keep_alive: u16,
    pub will: Option<LastWill>,
    pub username: Option<String>,
    pub password: Option<Vec<u8>>,
}

impl DecodeBody for ConnectPacket {
    fn decode_body(ba: &mut ByteArray, _header: FixedHeader) -> Result<Self, DecodeError> {
        let protocol_name = ba.read_string()?;
        if protocol_name != "MQTT" {
            return Err(DecodeError::InvalidProtocolName);
        }
        let protocol_level = ProtocolLevel::try_from(ba.read_byte()?)?;
        let flags = ba.read_byte()?;
        let username_flag = flags & 0b1000_0000 != 0;
        let password_flag = flags & 0b0100_0000 != 0;
        let will_retain = flags & 0b0010_0000 != 0;
        let will_qos = QoS::try_from((flags & 0b0001_1000) >> 3)?;
        let will_flag = flags & 0b0000_0100 != 0;
        let clean_session = flags & 0b0000_0010 != 0;

        let keep_alive = ba.read_u16()?;
        let client_id = ba.read_string()?.to_string();

        let will = if will_flag {
            let topic = ba.read_string()?.to_string();
            let message = ba.read_binary()?.to_vec();
            Some(LastWill {
                topic,
                message,
                qos: will_qos,
                retain: will_retain,
            })
        } else {
            None
        };

        let username = if username_flag {
            Some(ba.read_string()?.to_string())
        } else {
            None
        };
        let password = if password_flag {
            Some(ba.read_binary()?.to_vec())
        } else {
            None
        };

        Ok(Self {
            protocol_level,
            client_id,
            clean_session,
            keep_alive,
            will,
            username,
            password,
        })
    }
}

impl EncodeBody for ConnectPacket {
    fn packet_type(&self) -> PacketType {
        PacketType::Connect
    }

    fn encode_body(&self, buf: &mut Vec<u8>) -> Result<(), EncodeError> {
        write_string(buf, "MQTT")?;
        buf.push(self.protocol_level as u8);

        let mut flags = 0u8;
        if self.username.is_some() {
            flags |= 0b1000_0000;
        }
        if self.password.is_some() {
            flags |= 0b0100_0000;
        }
        if let Some(will) = &self.will {
            flags |= 0b0000_0100;
            flags |= u8::from(will.retain) << 5;
            flags |= u8::from(will.qos) << 3;
        }
        if self.clean_session {
            flags |= 0b0000_0010;
        }
        buf.push(flags);

        buf.extend_from_slice(&self.keep_alive.to_be_bytes());
        write_string(buf, &self.client_id)?;
        if let Some(will) = &self.will {
            write_string(buf, &will.topic)?;
            write_binary(buf, &will.message)?;
        }
        if let Some(username) = &self.username {
            write_string(buf, username)?;
        }
        if let Some(password) = &self.password {
            write_binary(buf, password)?;
        }
        Ok(())
    }
}

pub(crate) fn write_string(buf: &mut Vec<u8>, s: &str) -> Result<(), EncodeError> {
    write_binary(buf, s.as_bytes())
}

pub(crate) fn write_binary(buf: &mut Vec<u8>, data: &[u8]) -> Result<(), EncodeError> {
    let len = u16::try_from(data.len()).map_err(|_err| EncodeError::TooManyData)?;
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(data);
    Ok(())
}
