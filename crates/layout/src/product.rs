//! Product account
//!
//! ```text
//!   header (12 bytes)
//!   used_size: u32         @12
//!   first_price: Pubkey    @16
//!   metadata               @48 .. used_size
//! ```
//!
//! Metadata is a sequence of `(len:u8, key) (len:u8, value)` pairs. Decoding
//! stops at `used_size`; pair order is preserved so re-encoding is byte-exact.

use crate::error::CodecError;
use crate::header::{AccountHeader, AccountKind};
use crate::reader::{read_pubkey, read_u32, ByteReader, ByteWriter};
use solana_program::pubkey::Pubkey;

/// Allocated size of a product account
pub const PRODUCT_ACCOUNT_SIZE: usize = 512;

const METADATA_OFFSET: usize = 48;

/// Ordered product metadata
pub type Metadata = Vec<(String, String)>;

/// Product account record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRecord {
    pub used_size: u32,
    pub first_price_key: Pubkey,
    pub metadata: Metadata,
}

impl ProductRecord {
    /// Product with no price account and no metadata
    pub fn new() -> Self {
        Self {
            used_size: METADATA_OFFSET as u32,
            first_price_key: Pubkey::default(),
            metadata: Vec::new(),
        }
    }

    /// Replace metadata and recompute `used_size`
    pub fn set_metadata(&mut self, metadata: Metadata) -> Result<(), CodecError> {
        let encoded = encode_metadata(&metadata)?;
        self.used_size = (METADATA_OFFSET + encoded.len()) as u32;
        self.metadata = metadata;
        Ok(())
    }

    /// Look up a metadata value by key (last occurrence wins)
    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Display symbol, if set
    pub fn symbol(&self) -> Option<&str> {
        self.metadata_value("symbol")
    }

    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        let used_size = read_u32(data, 12)?;
        let first_price_key = read_pubkey(data, 16)?;
        let metadata = decode_metadata(data, METADATA_OFFSET, used_size as usize)?;

        Ok(Self {
            used_size,
            first_price_key,
            metadata,
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let mut writer = ByteWriter::with_capacity(PRODUCT_ACCOUNT_SIZE);
        AccountHeader::new(AccountKind::Product).write(&mut writer);
        writer.u32(self.used_size).pubkey(&self.first_price_key);
        for (key, value) in &self.metadata {
            writer.short_str(key)?.short_str(value)?;
        }
        Ok(writer.into_inner())
    }
}

impl Default for ProductRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode metadata pairs in order
pub fn encode_metadata(metadata: &[(String, String)]) -> Result<Vec<u8>, CodecError> {
    let mut writer = ByteWriter::new();
    for (key, value) in metadata {
        writer.short_str(key)?.short_str(value)?;
    }
    Ok(writer.into_inner())
}

/// Decode metadata pairs between `start` and `end`
pub fn decode_metadata(data: &[u8], start: usize, end: usize) -> Result<Metadata, CodecError> {
    let mut reader = ByteReader::at(data, start);
    let mut metadata = Vec::new();

    while reader.offset() < end {
        let key_start = reader.offset();
        // A zero key length marks an empty slot
        if reader.read_u8()? == 0 {
            continue;
        }
        let mut key_reader = ByteReader::at(data, key_start);
        let key = key_reader.read_short_str()?;
        let value = key_reader.read_short_str()?;
        reader = key_reader;
        metadata.push((key, value));
    }

    Ok(metadata)
}
