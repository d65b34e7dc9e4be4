//! Bounds-checked little-endian readers and writers
//!
//! All account and instruction layouts are fixed-offset, so decoding is a
//! matter of reading the right width at the right place. Every read checks
//! bounds and reports a [`CodecError::Truncated`] instead of panicking.

use crate::error::CodecError;
use solana_program::pubkey::Pubkey;

#[inline]
fn check(data: &[u8], offset: usize, needed: usize) -> Result<(), CodecError> {
    match offset.checked_add(needed) {
        Some(end) if end <= data.len() => Ok(()),
        _ => Err(CodecError::Truncated {
            offset,
            needed,
            len: data.len(),
        }),
    }
}

/// Read a fixed-size byte array
#[inline]
pub fn read_bytes<const N: usize>(data: &[u8], offset: usize) -> Result<[u8; N], CodecError> {
    check(data, offset, N)?;
    let mut bytes = [0u8; N];
    bytes.copy_from_slice(&data[offset..offset + N]);
    Ok(bytes)
}

/// Read a single byte
#[inline]
pub fn read_u8(data: &[u8], offset: usize) -> Result<u8, CodecError> {
    check(data, offset, 1)?;
    Ok(data[offset])
}

/// Read a little-endian u32
#[inline]
pub fn read_u32(data: &[u8], offset: usize) -> Result<u32, CodecError> {
    read_bytes(data, offset).map(u32::from_le_bytes)
}

/// Read a little-endian i32
#[inline]
pub fn read_i32(data: &[u8], offset: usize) -> Result<i32, CodecError> {
    read_bytes(data, offset).map(i32::from_le_bytes)
}

/// Read a little-endian u64
#[inline]
pub fn read_u64(data: &[u8], offset: usize) -> Result<u64, CodecError> {
    read_bytes(data, offset).map(u64::from_le_bytes)
}

/// Read a little-endian i64
#[inline]
pub fn read_i64(data: &[u8], offset: usize) -> Result<i64, CodecError> {
    read_bytes(data, offset).map(i64::from_le_bytes)
}

/// Read a raw 32-byte public key
#[inline]
pub fn read_pubkey(data: &[u8], offset: usize) -> Result<Pubkey, CodecError> {
    read_bytes::<32>(data, offset).map(Pubkey::new_from_array)
}

/// Sequential reader with tracked offset
///
/// Used for the variable-length tails of records (metadata pairs, price
/// components) and for instruction payloads.
pub struct ByteReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    #[inline]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Start reading at `offset`
    #[inline]
    pub fn at(data: &'a [u8], offset: usize) -> Self {
        Self { data, offset }
    }

    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.offset)
    }

    #[inline]
    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        let val = read_u8(self.data, self.offset)?;
        self.offset += 1;
        Ok(val)
    }

    #[inline]
    pub fn read_u32(&mut self) -> Result<u32, CodecError> {
        let val = read_u32(self.data, self.offset)?;
        self.offset += 4;
        Ok(val)
    }

    #[inline]
    pub fn read_i32(&mut self) -> Result<i32, CodecError> {
        let val = read_i32(self.data, self.offset)?;
        self.offset += 4;
        Ok(val)
    }

    #[inline]
    pub fn read_u64(&mut self) -> Result<u64, CodecError> {
        let val = read_u64(self.data, self.offset)?;
        self.offset += 8;
        Ok(val)
    }

    #[inline]
    pub fn read_i64(&mut self) -> Result<i64, CodecError> {
        let val = read_i64(self.data, self.offset)?;
        self.offset += 8;
        Ok(val)
    }

    #[inline]
    pub fn read_pubkey(&mut self) -> Result<Pubkey, CodecError> {
        let val = read_pubkey(self.data, self.offset)?;
        self.offset += 32;
        Ok(val)
    }

    /// Read a `(len:u8, utf8 bytes)` string
    pub fn read_short_str(&mut self) -> Result<String, CodecError> {
        let len = self.read_u8()? as usize;
        check(self.data, self.offset, len)?;
        let start = self.offset;
        let text = std::str::from_utf8(&self.data[start..start + len])
            .map_err(|_| CodecError::InvalidUtf8(start))?;
        self.offset += len;
        Ok(text.to_string())
    }
}

/// Append-only little-endian writer
#[derive(Debug, Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn u8(&mut self, val: u8) -> &mut Self {
        self.buf.push(val);
        self
    }

    pub fn u32(&mut self, val: u32) -> &mut Self {
        self.buf.extend_from_slice(&val.to_le_bytes());
        self
    }

    pub fn i32(&mut self, val: i32) -> &mut Self {
        self.buf.extend_from_slice(&val.to_le_bytes());
        self
    }

    pub fn u64(&mut self, val: u64) -> &mut Self {
        self.buf.extend_from_slice(&val.to_le_bytes());
        self
    }

    pub fn i64(&mut self, val: i64) -> &mut Self {
        self.buf.extend_from_slice(&val.to_le_bytes());
        self
    }

    pub fn bytes(&mut self, val: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(val);
        self
    }

    pub fn pubkey(&mut self, key: &Pubkey) -> &mut Self {
        self.bytes(key.as_ref())
    }

    /// Write a `(len:u8, utf8 bytes)` string
    pub fn short_str(&mut self, val: &str) -> Result<&mut Self, CodecError> {
        let len = u8::try_from(val.len()).map_err(|_| CodecError::MetadataTooLong(val.to_string()))?;
        self.u8(len);
        Ok(self.bytes(val.as_bytes()))
    }

    /// Zero-fill up to `len` bytes (no-op if already longer)
    pub fn pad_to(&mut self, len: usize) -> &mut Self {
        if self.buf.len() < len {
            self.buf.resize(len, 0);
        }
        self
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}
