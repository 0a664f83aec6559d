// The MQTT "Remaining Length" variable-byte integer (MQTT-1.5.5-1).

use crate::byte_array::ByteArray;
use crate::error::{DecodeError, EncodeError};

/// 256MB: the largest value four variable-length-integer bytes can hold.
pub const MAX_REMAINING_LENGTH: usize = 0x0FFF_FFFF;

/// A variable-length integer encoded as 1-4 bytes: the low 7 bits of each
/// byte hold data, the high bit marks "another byte follows".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RemainingLength(usize);

impl RemainingLength {
    /// # Errors
    /// Returns `EncodeError::InvalidVarInt` if `len` exceeds the 4-byte limit.
    pub fn new(len: usize) -> Result<Self, EncodeError> {
        if len > MAX_REMAINING_LENGTH {
            return Err(EncodeError::InvalidVarInt);
        }
        Ok(Self(len))
    }

    #[must_use]
    pub const fn value(&self) -> usize {
        self.0
    }

    /// Number of bytes this value occupies on the wire.
    #[must_use]
    pub const fn bytes(&self) -> usize {
        if self.0 > 0x001F_FFFF {
            4
        } else if self.0 > 0x0000_3FFF {
            3
        } else if self.0 > 0x0000_007F {
            2
        } else {
            1
        }
    }

    /// Try to decode a `RemainingLength` from the head of `buf` without
    /// requiring the rest of the packet to be present yet.
    ///
    /// Returns `Ok(None)` if `buf` does not yet contain a complete
    /// encoding (at most 4 bytes, terminated by a byte with the
    /// continuation bit clear) — the incremental framing layer uses this
    /// to decide whether to read more bytes before attempting a full
    /// packet decode.
    ///
    /// # Errors
    /// Returns `DecodeError::InvalidVarInt` if a 5th continuation byte
    /// would be required.
    pub fn peek(buf: &[u8]) -> Result<Option<(Self, usize)>, DecodeError> {
        let mut value: usize = 0;
        let mut multiplier: usize = 1;
        for (consumed, &byte) in buf.iter().enumerate().take(4) {
            value += usize::from(byte & 0x7F) * multiplier;
            if byte & 0x80 == 0 {
                return Ok(Some((Self(value), consumed + 1)));
            }
            multiplier *= 128;
        }
        if buf.len() >= 4 {
            return Err(DecodeError::InvalidVarInt);
        }
        Ok(None)
    }

    pub fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let mut value: usize = 0;
        let mut multiplier: usize = 1;
        loop {
            let byte = ba.read_byte()?;
            value += usize::from(byte & 0x7F) * multiplier;
            if byte & 0x80 == 0 {
                return Ok(Self(value));
            }
            multiplier *= 128;
            if multiplier > 128 * 128 * 128 * 128 {
                return Err(DecodeError::InvalidVarInt);
            }
        }
    }

    pub fn encode(&self, buf: &mut Vec<u8>) -> Result<(), EncodeError> {
        let mut n = self.0;
        loop {
            let mut byte = (n % 128) as u8;
            n /= 128;
            if n > 0 {
                byte |= 0x80;
            }
            buf.push(byte);
            if n == 0 {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_boundary_values() {
        for value in [0usize, 127, 128, 16_383, 16_384, 2_097_151, 2_097_152] {
            let rl = RemainingLength::new(value).unwrap();
            let mut buf = Vec::new();
            rl.encode(&mut buf).unwrap();
            assert_eq!(buf.len(), rl.bytes());
            let mut ba = ByteArray::new(&buf);
            assert_eq!(RemainingLength::decode(&mut ba).unwrap().value(), value);
        }
    }

    #[test]
    fn peek_reports_incomplete_without_consuming() {
        // 0x92 has the continuation bit set; a lone byte is not a full var-int.
        assert_eq!(RemainingLength::peek(&[0x92]).unwrap(), None);
        assert_eq!(
            RemainingLength::peek(&[0x92, 0x01]).unwrap(),
            Some((RemainingLength(146), 2))
        );
    }

    #[test]
    fn rejects_five_byte_encoding() {
        assert!(RemainingLength::peek(&[0xff, 0xff, 0xff, 0xff]).is_err());
    }
}
