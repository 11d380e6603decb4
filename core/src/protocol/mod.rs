//! Binary wire format: little-endian integers, 2-byte length-prefixed
//! UTF-8 strings, one `u8` packet id per frame.

use thiserror::Error;

pub mod ids;
pub mod outbound;

pub use ids::{min_packet_length, ClientPacketId, ServerPacketId};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("truncated frame: needed {needed} more byte(s), {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },
    #[error("string field is not valid UTF-8")]
    BadString,
}

/// Incremental frame builder. Appends are infallible; the caller decides
/// the packet id and field order.
#[derive(Debug, Default)]
pub struct PacketBuilder {
    data: Vec<u8>,
}

impl PacketBuilder {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    pub fn byte(mut self, value: u8) -> Self {
        self.data.push(value);
        self
    }

    pub fn int16(mut self, value: i16) -> Self {
        self.data.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn int32(mut self, value: i32) -> Self {
        self.data.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn float32(mut self, value: f32) -> Self {
        self.data.extend_from_slice(&value.to_le_bytes());
        self
    }

    /// 2-byte little-endian byte length, then the UTF-8 bytes. Strings
    /// longer than `u16::MAX` bytes are truncated at a char boundary.
    pub fn string(mut self, value: &str) -> Self {
        let mut bytes = value.as_bytes();
        if bytes.len() > u16::MAX as usize {
            let mut end = u16::MAX as usize;
            while !value.is_char_boundary(end) {
                end -= 1;
            }
            bytes = &value.as_bytes()[..end];
        }
        self.data.extend_from_slice(&(bytes.len() as u16).to_le_bytes());
        self.data.extend_from_slice(bytes);
        self
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

/// Cursor over a received frame. Every read reports truncation as an
/// error value; hostile short frames never panic the server.
#[derive(Debug)]
pub struct PacketReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> PacketReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8], WireError> {
        if self.remaining() < count {
            return Err(WireError::Truncated {
                needed: count - self.remaining(),
                remaining: self.remaining(),
            });
        }
        let slice = &self.data[self.offset..self.offset + count];
        self.offset += count;
        Ok(slice)
    }

    pub fn byte(&mut self) -> Result<u8, WireError> {
        Ok(self.take(1)?[0])
    }

    pub fn int16(&mut self) -> Result<i16, WireError> {
        let b = self.take(2)?;
        Ok(i16::from_le_bytes([b[0], b[1]]))
    }

    pub fn uint16(&mut self) -> Result<u16, WireError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn int32(&mut self) -> Result<i32, WireError> {
        let b = self.take(4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn float32(&mut self) -> Result<f32, WireError> {
        let b = self.take(4)?;
        Ok(f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn string(&mut self) -> Result<String, WireError> {
        let len = self.uint16()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| WireError::BadString)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_scalars() {
        let frame = PacketBuilder::new()
            .byte(42)
            .int16(-1)
            .int16(0x1234)
            .int32(0x12345678)
            .int32(-42)
            .float32(1.5)
            .into_bytes();

        let mut reader = PacketReader::new(&frame);
        assert_eq!(reader.byte().unwrap(), 42);
        assert_eq!(reader.int16().unwrap(), -1);
        assert_eq!(reader.int16().unwrap(), 0x1234);
        assert_eq!(reader.int32().unwrap(), 0x12345678);
        assert_eq!(reader.int32().unwrap(), -42);
        assert_eq!(reader.float32().unwrap(), 1.5);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn round_trip_strings() {
        let frame = PacketBuilder::new()
            .string("alice")
            .string("")
            .string("ñandú")
            .into_bytes();

        let mut reader = PacketReader::new(&frame);
        assert_eq!(reader.string().unwrap(), "alice");
        assert_eq!(reader.string().unwrap(), "");
        assert_eq!(reader.string().unwrap(), "ñandú");
    }

    #[test]
    fn little_endian_layout() {
        let frame = PacketBuilder::new().int16(0x0201).into_bytes();
        assert_eq!(frame, vec![0x01, 0x02]);

        let frame = PacketBuilder::new().int32(0x04030201).into_bytes();
        assert_eq!(frame, vec![0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn string_length_prefix_counts_bytes() {
        // "ñ" is two bytes in UTF-8.
        let frame = PacketBuilder::new().string("ñ").into_bytes();
        assert_eq!(frame[0], 2);
        assert_eq!(frame[1], 0);
        assert_eq!(frame.len(), 4);
    }

    #[test]
    fn truncated_reads_report_error() {
        let mut reader = PacketReader::new(&[0x01]);
        assert_eq!(
            reader.int16(),
            Err(WireError::Truncated {
                needed: 1,
                remaining: 1
            })
        );

        // A string whose declared length exceeds the remaining bytes.
        let mut reader = PacketReader::new(&[0x05, 0x00, b'a', b'b']);
        assert!(matches!(
            reader.string(),
            Err(WireError::Truncated { .. })
        ));

        let mut reader = PacketReader::new(&[]);
        assert!(reader.byte().is_err());
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        let mut reader = PacketReader::new(&[0x02, 0x00, 0xFF, 0xFE]);
        assert_eq!(reader.string(), Err(WireError::BadString));
    }
}
