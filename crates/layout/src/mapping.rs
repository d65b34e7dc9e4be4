//! Mapping account
//!
//! ```text
//!   header (12 bytes)
//!   used_size: u32        @12
//!   product_count: u32    @16
//!   unused: u32           @20
//!   next_mapping: Pubkey  @24
//!   product_keys: [Pubkey; product_count] @56
//! ```

use crate::error::CodecError;
use crate::header::{AccountHeader, AccountKind};
use crate::reader::{read_pubkey, read_u32, ByteWriter};
use solana_program::pubkey::Pubkey;

/// Allocated size of a mapping account
pub const MAPPING_ACCOUNT_SIZE: usize = 20536;

/// Product slots in a single mapping account
pub const MAPPING_PRODUCT_LIMIT: usize = 640;

const PRODUCT_KEYS_OFFSET: usize = 56;

/// One node of the mapping linked list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingRecord {
    pub used_size: u32,
    pub product_count: u32,
    pub next_mapping_key: Pubkey,
    pub product_keys: Vec<Pubkey>,
}

impl MappingRecord {
    /// Freshly initialized mapping account (empty tail)
    pub fn new() -> Self {
        Self {
            used_size: PRODUCT_KEYS_OFFSET as u32,
            product_count: 0,
            next_mapping_key: Pubkey::default(),
            product_keys: Vec::new(),
        }
    }

    /// Append a product key, keeping the count and size in step
    pub fn push_product(&mut self, product: Pubkey) {
        self.product_keys.push(product);
        self.product_count = self.product_keys.len() as u32;
        self.used_size = (PRODUCT_KEYS_OFFSET + self.product_keys.len() * 32) as u32;
    }

    /// Remove a product key if present
    pub fn remove_product(&mut self, product: &Pubkey) -> bool {
        let before = self.product_keys.len();
        self.product_keys.retain(|key| key != product);
        self.product_count = self.product_keys.len() as u32;
        self.used_size = (PRODUCT_KEYS_OFFSET + self.product_keys.len() * 32) as u32;
        before != self.product_keys.len()
    }

    pub fn is_tail(&self) -> bool {
        self.next_mapping_key == Pubkey::default()
    }

    pub fn is_full(&self) -> bool {
        self.product_keys.len() >= MAPPING_PRODUCT_LIMIT
    }

    /// Decode the body of a mapping account (header already checked)
    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        let used_size = read_u32(data, 12)?;
        let product_count = read_u32(data, 16)?;
        let next_mapping_key = read_pubkey(data, 24)?;

        let product_keys = (0..product_count as usize)
            .map(|i| read_pubkey(data, PRODUCT_KEYS_OFFSET + i * 32))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            used_size,
            product_count,
            next_mapping_key,
            product_keys,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut writer =
            ByteWriter::with_capacity(PRODUCT_KEYS_OFFSET + self.product_keys.len() * 32);
        AccountHeader::new(AccountKind::Mapping).write(&mut writer);
        writer
            .u32(self.used_size)
            .u32(self.product_count)
            .u32(0)
            .pubkey(&self.next_mapping_key);
        for key in &self.product_keys {
            writer.pubkey(key);
        }
        writer.into_inner()
    }
}

impl Default for MappingRecord {
    fn default() -> Self {
        Self::new()
    }
}
