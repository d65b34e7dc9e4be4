//! Authority permission account
//!
//! Global program administration authorities. Unrelated to per-symbol
//! publisher permissions, which live in price accounts.

use crate::error::CodecError;
use crate::header::{AccountHeader, AccountKind};
use crate::reader::{read_pubkey, ByteWriter};
use solana_program::pubkey::Pubkey;

/// Allocated size of the permission account
pub const PERMISSION_ACCOUNT_SIZE: usize = 112;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PermissionRecord {
    /// CRUD on mapping, product and price accounts
    pub master_authority: Pubkey,
    /// Publisher (de)permissioning and minimum publishers
    pub data_curation_authority: Pubkey,
    /// Price account resizing
    pub security_authority: Pubkey,
}

impl PermissionRecord {
    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        Ok(Self {
            master_authority: read_pubkey(data, 16)?,
            data_curation_authority: read_pubkey(data, 48)?,
            security_authority: read_pubkey(data, 80)?,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut writer = ByteWriter::with_capacity(PERMISSION_ACCOUNT_SIZE);
        AccountHeader::new(AccountKind::Permission).write(&mut writer);
        writer
            .u32(PERMISSION_ACCOUNT_SIZE as u32)
            .pubkey(&self.master_authority)
            .pubkey(&self.data_curation_authority)
            .pubkey(&self.security_authority);
        writer.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_layout() {
        let record = PermissionRecord {
            master_authority: Pubkey::new_unique(),
            data_curation_authority: Pubkey::new_unique(),
            security_authority: Pubkey::new_unique(),
        };
        let data = record.encode();
        assert_eq!(data.len(), PERMISSION_ACCOUNT_SIZE);
        assert_eq!(&data[48..80], record.data_curation_authority.as_ref());
    }

    #[test]
    fn test_permission_truncated() {
        assert!(PermissionRecord::decode(&[0u8; 100]).is_err());
    }
}
