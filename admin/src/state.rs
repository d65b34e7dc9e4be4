//! Decoded on-chain state of one fetch

use crate::mapping::{order_mapping_chain, BrokenChainError};
use crate::rpc::KeyedAccount;
use oracle_layout::{
    decode_account, permissions_address, AccountRecord, MappingRecord, PermissionRecord,
    PriceRecord, ProductRecord,
};
use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;

/// Program accounts by key, scoped to a single reconciliation pass
#[derive(Debug, Clone, Default)]
pub struct ProgramAccounts {
    pub mappings: HashMap<Pubkey, MappingRecord>,
    pub products: HashMap<Pubkey, ProductRecord>,
    pub prices: HashMap<Pubkey, PriceRecord>,
    pub permissions: HashMap<Pubkey, PermissionRecord>,
}

impl ProgramAccounts {
    /// Decode a program account scan
    ///
    /// Foreign and test accounts are skipped. Accounts that fail to decode are
    /// logged and dropped; they never abort the run.
    pub fn from_accounts(accounts: impl IntoIterator<Item = KeyedAccount>) -> Self {
        let mut state = Self::default();

        for account in accounts {
            match decode_account(&account.data) {
                Ok(Some(AccountRecord::Mapping(record))) => {
                    state.mappings.insert(account.pubkey, record);
                }
                Ok(Some(AccountRecord::Product(record))) => {
                    state.products.insert(account.pubkey, record);
                }
                Ok(Some(AccountRecord::Price(record))) => {
                    state.prices.insert(account.pubkey, record);
                }
                Ok(Some(AccountRecord::Permission(record))) => {
                    state.permissions.insert(account.pubkey, record);
                }
                Ok(None) => {}
                Err(e) => {
                    log::warn!("Dropping account {}: {}", account.pubkey, e);
                }
            }
        }

        log::debug!(
            "Decoded {} mapping, {} product, {} price accounts",
            state.mappings.len(),
            state.products.len(),
            state.prices.len()
        );

        state
    }

    pub fn mapping_chain(&self) -> Result<Vec<Pubkey>, BrokenChainError> {
        order_mapping_chain(&self.mappings)
    }

    pub fn permission(&self, program_id: &Pubkey) -> Option<&PermissionRecord> {
        self.permissions.get(&permissions_address(program_id))
    }

    pub fn len(&self) -> usize {
        self.mappings.len() + self.products.len() + self.prices.len() + self.permissions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oracle_layout::MAGIC;

    fn keyed(data: Vec<u8>) -> KeyedAccount {
        KeyedAccount {
            pubkey: Pubkey::new_unique(),
            owner: Pubkey::new_unique(),
            lamports: 1,
            data,
        }
    }

    #[test]
    fn test_sorts_accounts_by_kind() {
        let mapping = MappingRecord::new();
        let product = ProductRecord::new();
        let price = PriceRecord::new(Pubkey::new_unique(), -8, 1);

        let state = ProgramAccounts::from_accounts(vec![
            keyed(mapping.encode()),
            keyed(product.encode().unwrap()),
            keyed(price.encode()),
        ]);

        assert_eq!(state.mappings.len(), 1);
        assert_eq!(state.products.len(), 1);
        assert_eq!(state.prices.len(), 1);
        assert_eq!(state.len(), 3);
    }

    #[test]
    fn test_drops_foreign_and_malformed_accounts() {
        let mut truncated = PriceRecord::new(Pubkey::new_unique(), -8, 1).encode();
        truncated.truncate(64);

        let mut foreign = vec![0u8; 64];
        foreign[..4].copy_from_slice(&0x1234_5678u32.to_le_bytes());

        let mut unknown_kind = vec![0u8; 64];
        unknown_kind[..4].copy_from_slice(&MAGIC.to_le_bytes());
        unknown_kind[4..8].copy_from_slice(&2u32.to_le_bytes());
        unknown_kind[8..12].copy_from_slice(&99u32.to_le_bytes());

        let state = ProgramAccounts::from_accounts(vec![
            keyed(truncated),
            keyed(foreign),
            keyed(unknown_kind),
            keyed(vec![1, 2, 3]),
            keyed(MappingRecord::new().encode()),
        ]);

        assert_eq!(state.len(), 1);
        assert_eq!(state.mapping_chain().unwrap().len(), 1);
    }
}
