//! Oracle account layout
//!
//! Binary codec for the oracle program's accounts and instructions.
//!
//! ## Accounts
//!
//! All accounts share a 12-byte header (magic, version, kind). Accounts whose
//! header does not match are reported as absent rather than as errors, so a
//! full program-account scan can skip anything this layout does not own.
//!
//! | Kind | Record | Allocated size |
//! |---|---|---|
//! | 1 | [`MappingRecord`] | 20536 |
//! | 2 | [`ProductRecord`] | 512 |
//! | 3 | [`PriceRecord`] | 3312 (v1) / 12576 (v2) |
//! | 5 | [`PermissionRecord`] | 112 |
//!
//! ## Instructions
//!
//! Builders in [`instruction`] return complete `Instruction`s (program id,
//! ordered account metas, payload). [`OracleCommand::decode`] parses payloads
//! back for inspection.

pub mod account;
pub mod error;
pub mod header;
pub mod instruction;
pub mod mapping;
pub mod permission;
pub mod price;
pub mod product;
pub mod reader;

pub use account::{decode_account, AccountRecord};
pub use error::CodecError;
pub use header::{AccountHeader, AccountKind, HEADER_SIZE, MAGIC, VERSION};
pub use instruction::{permissions_address, Command, OracleCommand};
pub use mapping::{MappingRecord, MAPPING_ACCOUNT_SIZE, MAPPING_PRODUCT_LIMIT};
pub use permission::{PermissionRecord, PERMISSION_ACCOUNT_SIZE};
pub use price::{
    PriceAccountVersion, PriceComponent, PriceInfo, PriceRecord, COMPONENT_SIZE,
    PRICE_HEADER_SIZE,
};
pub use product::{Metadata, ProductRecord, PRODUCT_ACCOUNT_SIZE};
