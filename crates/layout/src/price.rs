//! Price account
//!
//! Fixed 240-byte header followed by 96-byte price components. The component
//! list ends at the first all-zero publisher key or at the end of the buffer;
//! `components_count` is informational only.

use crate::error::CodecError;
use crate::header::{AccountHeader, AccountKind};
use crate::reader::{
    read_bytes, read_i32, read_i64, read_pubkey, read_u32, read_u64, read_u8, ByteReader,
    ByteWriter,
};
use solana_program::pubkey::Pubkey;

/// Offset of the first price component
pub const PRICE_HEADER_SIZE: usize = 240;

/// Bytes per price component (key + aggregate + latest)
pub const COMPONENT_SIZE: usize = 96;

/// Price type written by add-price
pub const PRICE_TYPE_PRICE: u32 = 1;

/// Price account format, selects the allocated size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PriceAccountVersion {
    #[default]
    V1,
    V2,
}

impl PriceAccountVersion {
    /// Allocated account size in bytes
    pub const fn size(self) -> usize {
        match self {
            PriceAccountVersion::V1 => 3312,
            PriceAccountVersion::V2 => 12576,
        }
    }

    /// Publisher slots available
    pub const fn max_components(self) -> usize {
        match self {
            PriceAccountVersion::V1 => 32,
            PriceAccountVersion::V2 => 128,
        }
    }
}

/// Price, confidence and status as published
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PriceInfo {
    pub price: i64,
    pub confidence: u64,
    pub status: u32,
    pub corporate_action: u32,
    pub publish_slot: u64,
}

impl PriceInfo {
    pub const SIZE: usize = 32;

    fn read(reader: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            price: reader.read_i64()?,
            confidence: reader.read_u64()?,
            status: reader.read_u32()?,
            corporate_action: reader.read_u32()?,
            publish_slot: reader.read_u64()?,
        })
    }

    fn write(&self, writer: &mut ByteWriter) {
        writer
            .i64(self.price)
            .u64(self.confidence)
            .u32(self.status)
            .u32(self.corporate_action)
            .u64(self.publish_slot);
    }
}

/// One publisher's slot in a price account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceComponent {
    pub publisher_key: Pubkey,
    pub aggregate_price_info: PriceInfo,
    pub latest_price_info: PriceInfo,
}

impl PriceComponent {
    pub fn new(publisher_key: Pubkey) -> Self {
        Self {
            publisher_key,
            aggregate_price_info: PriceInfo::default(),
            latest_price_info: PriceInfo::default(),
        }
    }
}

/// Price account record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceRecord {
    pub used_size: u32,
    pub price_type: u32,
    pub exponent: i32,
    pub components_count: u32,
    pub quoters_count: u32,
    pub last_slot: u64,
    pub valid_slot: u64,
    pub ema_price: [u8; 24],
    pub ema_confidence: [u8; 24],
    pub timestamp: i64,
    pub min_publishers: u8,
    pub product_key: Pubkey,
    pub next_price_key: Pubkey,
    pub previous_slot: u64,
    pub previous_price: i64,
    pub previous_confidence: u64,
    pub previous_timestamp: i64,
    pub aggregate: PriceInfo,
    pub components: Vec<PriceComponent>,
}

impl PriceRecord {
    /// Freshly added price account
    pub fn new(product_key: Pubkey, exponent: i32, price_type: u32) -> Self {
        Self {
            used_size: PRICE_HEADER_SIZE as u32,
            price_type,
            exponent,
            components_count: 0,
            quoters_count: 0,
            last_slot: 0,
            valid_slot: 0,
            ema_price: [0; 24],
            ema_confidence: [0; 24],
            timestamp: 0,
            min_publishers: 0,
            product_key,
            next_price_key: Pubkey::default(),
            previous_slot: 0,
            previous_price: 0,
            previous_confidence: 0,
            previous_timestamp: 0,
            aggregate: PriceInfo::default(),
            components: Vec::new(),
        }
    }

    pub fn publisher_keys(&self) -> impl Iterator<Item = &Pubkey> + '_ {
        self.components.iter().map(|c| &c.publisher_key)
    }

    pub fn has_publisher(&self, publisher: &Pubkey) -> bool {
        self.publisher_keys().any(|key| key == publisher)
    }

    /// Add a publisher slot (no-op if already present)
    pub fn add_publisher(&mut self, publisher: Pubkey) -> bool {
        if self.has_publisher(&publisher) {
            return false;
        }
        self.components.push(PriceComponent::new(publisher));
        self.sync_counts();
        true
    }

    /// Drop a publisher slot, keeping the remaining order
    pub fn remove_publisher(&mut self, publisher: &Pubkey) -> bool {
        let before = self.components.len();
        self.components.retain(|c| &c.publisher_key != publisher);
        self.sync_counts();
        before != self.components.len()
    }

    fn sync_counts(&mut self) {
        self.components_count = self.components.len() as u32;
        self.used_size = (PRICE_HEADER_SIZE + self.components.len() * COMPONENT_SIZE) as u32;
    }

    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        let mut aggregate_reader = ByteReader::at(data, 208);
        let aggregate = PriceInfo::read(&mut aggregate_reader)?;

        let mut record = Self {
            used_size: read_u32(data, 12)?,
            price_type: read_u32(data, 16)?,
            exponent: read_i32(data, 20)?,
            components_count: read_u32(data, 24)?,
            quoters_count: read_u32(data, 28)?,
            last_slot: read_u64(data, 32)?,
            valid_slot: read_u64(data, 40)?,
            ema_price: read_bytes(data, 48)?,
            ema_confidence: read_bytes(data, 72)?,
            timestamp: read_i64(data, 96)?,
            min_publishers: read_u8(data, 104)?,
            product_key: read_pubkey(data, 112)?,
            next_price_key: read_pubkey(data, 144)?,
            previous_slot: read_u64(data, 176)?,
            previous_price: read_i64(data, 184)?,
            previous_confidence: read_u64(data, 192)?,
            previous_timestamp: read_i64(data, 200)?,
            aggregate,
            components: Vec::new(),
        };

        // v2 accounts carry a cumulative block after the last slot
        let max_components = PriceAccountVersion::V2.max_components();
        let mut reader = ByteReader::at(data, PRICE_HEADER_SIZE);
        while reader.remaining() > 0 && record.components.len() < max_components {
            let publisher_key = reader.read_pubkey()?;
            if publisher_key == Pubkey::default() {
                break;
            }
            record.components.push(PriceComponent {
                publisher_key,
                aggregate_price_info: PriceInfo::read(&mut reader)?,
                latest_price_info: PriceInfo::read(&mut reader)?,
            });
        }

        Ok(record)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut writer =
            ByteWriter::with_capacity(PRICE_HEADER_SIZE + self.components.len() * COMPONENT_SIZE);
        AccountHeader::new(AccountKind::Price).write(&mut writer);
        writer
            .u32(self.used_size)
            .u32(self.price_type)
            .i32(self.exponent)
            .u32(self.components_count)
            .u32(self.quoters_count)
            .u64(self.last_slot)
            .u64(self.valid_slot)
            .bytes(&self.ema_price)
            .bytes(&self.ema_confidence)
            .i64(self.timestamp)
            .u8(self.min_publishers)
            .pad_to(112)
            .pubkey(&self.product_key)
            .pubkey(&self.next_price_key)
            .u64(self.previous_slot)
            .i64(self.previous_price)
            .u64(self.previous_confidence)
            .i64(self.previous_timestamp);
        self.aggregate.write(&mut writer);

        for component in &self.components {
            writer.pubkey(&component.publisher_key);
            component.aggregate_price_info.write(&mut writer);
            component.latest_price_info.write(&mut writer);
        }
        writer.into_inner()
    }
}
