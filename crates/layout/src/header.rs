//! Common account header
//!
//! Every oracle account starts with the same 12 bytes:
//!
//! ```text
//!   magic: u32     - 0xa1b2c3d4
//!   version: u32   - layout version (2)
//!   kind: u32      - account kind discriminant
//! ```
//!
//! Mapping, product, price and permission accounts follow with a `size: u32`
//! at offset 12 (the number of bytes in use).

use crate::error::CodecError;
use crate::reader::{read_u32, ByteWriter};

/// Magic number at offset 0 of every oracle account
pub const MAGIC: u32 = 0xa1b2_c3d4;

/// Layout version carried in headers and instruction payloads
pub const VERSION: u32 = 2;

/// Size of the common header (magic, version, kind)
pub const HEADER_SIZE: usize = 12;

/// Account kind discriminant
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccountKind {
    Mapping = 1,
    Product = 2,
    Price = 3,
    Test = 4,
    Permission = 5,
}

impl TryFrom<u32> for AccountKind {
    type Error = CodecError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(AccountKind::Mapping),
            2 => Ok(AccountKind::Product),
            3 => Ok(AccountKind::Price),
            4 => Ok(AccountKind::Test),
            5 => Ok(AccountKind::Permission),
            other => Err(CodecError::UnknownAccountKind(other)),
        }
    }
}

/// Raw account header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountHeader {
    pub magic: u32,
    pub version: u32,
    pub kind: u32,
}

impl AccountHeader {
    pub fn new(kind: AccountKind) -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
            kind: kind as u32,
        }
    }

    /// Parse the first 12 bytes
    pub fn parse(data: &[u8]) -> Result<Self, CodecError> {
        Ok(Self {
            magic: read_u32(data, 0)?,
            version: read_u32(data, 4)?,
            kind: read_u32(data, 8)?,
        })
    }

    /// Magic and version match this layout
    pub fn is_recognized(&self) -> bool {
        self.magic == MAGIC && self.version == VERSION
    }

    pub fn write(&self, writer: &mut ByteWriter) {
        writer.u32(self.magic).u32(self.version).u32(self.kind);
    }
}
