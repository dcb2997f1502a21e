//! Hand-written big-endian wire codec.
//!
//! Every consensus structure in this chain serializes to a fixed big-endian
//! layout, length-prefixed where variable. Block heights and timestamps use
//! a 5-byte unsigned integer.

use thiserror::Error;

/// Byte width of block heights and timestamps on the wire.
pub const HEIGHT_WIDTH: usize = 5;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CodecError {
    #[error("unexpected end of input: need {need} more bytes, {left} left")]
    UnexpectedEof { need: usize, left: usize },
    #[error("trailing bytes after decoding: {0} left")]
    TrailingBytes(usize),
    #[error("malformed field: {0}")]
    Malformed(String),
}

/// Bounds-checked cursor over an input slice.
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Reader { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Fails with `TrailingBytes` unless the whole input was consumed.
    pub fn finish(self) -> Result<(), CodecError> {
        match self.remaining() {
            0 => Ok(()),
            left => Err(CodecError::TrailingBytes(left)),
        }
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < n {
            return Err(CodecError::UnexpectedEof {
                need: n,
                left: self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, CodecError> {
        Ok(u16::from_be_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, CodecError> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, CodecError> {
        Ok(u64::from_be_bytes(self.read_array()?))
    }

    /// 5-byte big-endian block height or timestamp.
    pub fn read_height(&mut self) -> Result<u64, CodecError> {
        let bytes = self.take(HEIGHT_WIDTH)?;
        let mut value = 0u64;
        for b in bytes {
            value = (value << 8) | u64::from(*b);
        }
        Ok(value)
    }
}

pub fn write_u16(buf: &mut Vec<u8>, value: u16) {
    buf.extend_from_slice(&value.to_be_bytes());
}

pub fn write_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_be_bytes());
}

pub fn write_u64(buf: &mut Vec<u8>, value: u64) {
    buf.extend_from_slice(&value.to_be_bytes());
}

/// 5-byte big-endian block height or timestamp. Values above 2^40 - 1 do not
/// occur on this chain; the high bytes are silently dropped by contract.
pub fn write_height(buf: &mut Vec<u8>, value: u64) {
    buf.extend_from_slice(&value.to_be_bytes()[8 - HEIGHT_WIDTH..]);
}

/// Types with a canonical wire form.
pub trait WireFormat: Sized {
    fn write(&self, buf: &mut Vec<u8>);
    fn read(reader: &mut Reader<'_>) -> Result<Self, CodecError>;

    fn to_vec(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.write(&mut buf);
        buf
    }

    /// Decode a value that must span the whole input.
    fn from_slice(data: &[u8]) -> Result<Self, CodecError> {
        let mut reader = Reader::new(data);
        let value = Self::read(&mut reader)?;
        reader.finish()?;
        Ok(value)
    }
}
