//! Tagged account records and header dispatch

use crate::error::CodecError;
use crate::header::{AccountHeader, AccountKind, HEADER_SIZE};
use crate::mapping::MappingRecord;
use crate::permission::PermissionRecord;
use crate::price::PriceRecord;
use crate::product::ProductRecord;

/// Any decoded oracle account
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountRecord {
    Mapping(MappingRecord),
    Product(ProductRecord),
    Price(PriceRecord),
    Permission(PermissionRecord),
}

impl AccountRecord {
    pub fn kind(&self) -> AccountKind {
        match self {
            AccountRecord::Mapping(_) => AccountKind::Mapping,
            AccountRecord::Product(_) => AccountKind::Product,
            AccountRecord::Price(_) => AccountKind::Price,
            AccountRecord::Permission(_) => AccountKind::Permission,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        match self {
            AccountRecord::Mapping(record) => Ok(record.encode()),
            AccountRecord::Product(record) => record.encode(),
            AccountRecord::Price(record) => Ok(record.encode()),
            AccountRecord::Permission(record) => Ok(record.encode()),
        }
    }
}

/// Decode raw account data
///
/// Returns `Ok(None)` for accounts that do not carry this layout's magic and
/// version, and for test accounts. A recognized header followed by a short or
/// malformed body is an error.
pub fn decode_account(data: &[u8]) -> Result<Option<AccountRecord>, CodecError> {
    if data.len() < HEADER_SIZE {
        return Err(CodecError::Truncated {
            offset: 0,
            needed: HEADER_SIZE,
            len: data.len(),
        });
    }

    let header = AccountHeader::parse(data)?;
    if !header.is_recognized() {
        return Ok(None);
    }

    let record = match AccountKind::try_from(header.kind)? {
        AccountKind::Mapping => AccountRecord::Mapping(MappingRecord::decode(data)?),
        AccountKind::Product => AccountRecord::Product(ProductRecord::decode(data)?),
        AccountKind::Price => AccountRecord::Price(PriceRecord::decode(data)?),
        AccountKind::Permission => AccountRecord::Permission(PermissionRecord::decode(data)?),
        AccountKind::Test => return Ok(None),
    };

    Ok(Some(record))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{MAGIC, VERSION};
    use crate::price::{PriceAccountVersion, PriceComponent, PriceInfo, PRICE_TYPE_PRICE};
    use crate::product::PRODUCT_ACCOUNT_SIZE;
    use crate::reader::ByteWriter;
    use proptest::prelude::*;
    use solana_program::pubkey::Pubkey;

    fn roundtrip(record: AccountRecord) {
        let data = record.encode().unwrap();
        assert_eq!(decode_account(&data).unwrap(), Some(record));
    }

    fn header_bytes(magic: u32, version: u32, kind: u32) -> Vec<u8> {
        let mut writer = ByteWriter::new();
        writer.u32(magic).u32(version).u32(kind).pad_to(256);
        writer.into_inner()
    }

    #[test]
    fn test_foreign_magic_is_absent() {
        let data = header_bytes(0xdead_beef, VERSION, 1);
        assert_eq!(decode_account(&data), Ok(None));
    }

    #[test]
    fn test_foreign_version_is_absent() {
        let data = header_bytes(MAGIC, VERSION + 1, 1);
        assert_eq!(decode_account(&data), Ok(None));
    }

    #[test]
    fn test_test_account_is_absent() {
        let data = header_bytes(MAGIC, VERSION, AccountKind::Test as u32);
        assert_eq!(decode_account(&data), Ok(None));
    }

    #[test]
    fn test_unknown_kind_is_error() {
        let data = header_bytes(MAGIC, VERSION, 42);
        assert_eq!(
            decode_account(&data),
            Err(CodecError::UnknownAccountKind(42))
        );
    }

    #[test]
    fn test_undersized_buffer_is_error() {
        assert!(matches!(
            decode_account(&[0xd4, 0xc3]),
            Err(CodecError::Truncated { .. })
        ));
    }

    #[test]
    fn test_truncated_body_is_error() {
        let data = AccountRecord::Price(PriceRecord::new(Pubkey::new_unique(), -5, 1))
            .encode()
            .unwrap();
        assert!(decode_account(&data[..100]).is_err());
    }

    #[test]
    fn test_mapping_roundtrip() {
        let mut mapping = MappingRecord::new();
        mapping.next_mapping_key = Pubkey::new_unique();
        for _ in 0..3 {
            mapping.push_product(Pubkey::new_unique());
        }
        roundtrip(AccountRecord::Mapping(mapping));
    }

    #[test]
    fn test_product_roundtrip_padded() {
        let mut product = ProductRecord::new();
        product.first_price_key = Pubkey::new_unique();
        product
            .set_metadata(vec![
                ("symbol".to_string(), "Equity.US.AAPL/USD".to_string()),
                ("country".to_string(), "US".to_string()),
                ("base".to_string(), "AAPL".to_string()),
            ])
            .unwrap();

        let mut data = product.encode().unwrap();
        data.resize(PRODUCT_ACCOUNT_SIZE, 0);
        assert_eq!(
            decode_account(&data).unwrap(),
            Some(AccountRecord::Product(product))
        );
    }

    #[test]
    fn test_permission_roundtrip() {
        roundtrip(AccountRecord::Permission(PermissionRecord {
            master_authority: Pubkey::new_unique(),
            data_curation_authority: Pubkey::new_unique(),
            security_authority: Pubkey::new_unique(),
        }));
    }

    fn price_with_components(count: usize) -> PriceRecord {
        let mut price = PriceRecord::new(Pubkey::new_unique(), -8, PRICE_TYPE_PRICE);
        for i in 0..count {
            price.components.push(PriceComponent {
                publisher_key: Pubkey::new_unique(),
                aggregate_price_info: PriceInfo {
                    price: i as i64 * 100,
                    confidence: 5,
                    status: 1,
                    corporate_action: 0,
                    publish_slot: 10 + i as u64,
                },
                latest_price_info: PriceInfo::default(),
            });
        }
        price.components_count = count as u32;
        price
    }

    #[test]
    fn test_price_roundtrip_component_counts() {
        let max = PriceAccountVersion::V1.max_components();
        for count in [0, 1, max] {
            let price = price_with_components(count);
            let mut data = price.encode();
            data.resize(PriceAccountVersion::V1.size(), 0);
            assert_eq!(
                decode_account(&data).unwrap(),
                Some(AccountRecord::Price(price))
            );
        }
    }

    proptest! {
        #[test]
        fn prop_product_metadata_roundtrip(
            pairs in proptest::collection::vec(("[a-z_]{1,16}", "[ -~]{0,40}"), 0..8)
        ) {
            let mut product = ProductRecord::new();
            product.set_metadata(pairs).unwrap();
            let data = product.encode().unwrap();
            prop_assert_eq!(decode_account(&data).unwrap(), Some(AccountRecord::Product(product)));
        }
    }
}
