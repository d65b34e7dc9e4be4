//! Oracle program instructions
//!
//! Wire format: `version:u32 || command:i32 || command fields`. The account
//! order and signer/writable flags of each builder are part of the program's
//! contract and must not change.

use crate::error::CodecError;
use crate::header::VERSION;
use crate::price::PRICE_TYPE_PRICE;
use crate::product::{decode_metadata, encode_metadata, Metadata};
use crate::reader::{ByteReader, ByteWriter};
use solana_program::{
    bpf_loader_upgradeable,
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    system_program,
};

/// Seed of the authority permission PDA
pub const PERMISSIONS_SEED: &[u8] = b"permissions";

/// Size of the `version || command` prefix
pub const COMMAND_HEADER_SIZE: usize = 8;

/// Command codes
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    InitMapping = 0,
    AddProduct = 2,
    UpdateProduct = 3,
    AddPrice = 4,
    AddPublisher = 5,
    RemovePublisher = 6,
    SetMinPublishers = 12,
    ResizePriceAccount = 14,
    DeletePrice = 15,
    DeleteProduct = 16,
    UpdatePermissions = 17,
}

impl TryFrom<i32> for Command {
    type Error = CodecError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Command::InitMapping,
            2 => Command::AddProduct,
            3 => Command::UpdateProduct,
            4 => Command::AddPrice,
            5 => Command::AddPublisher,
            6 => Command::RemovePublisher,
            12 => Command::SetMinPublishers,
            14 => Command::ResizePriceAccount,
            15 => Command::DeletePrice,
            16 => Command::DeleteProduct,
            17 => Command::UpdatePermissions,
            other => return Err(CodecError::UnknownCommand(other)),
        })
    }
}

fn command_data(command: Command) -> ByteWriter {
    let mut writer = ByteWriter::with_capacity(COMMAND_HEADER_SIZE);
    writer.u32(VERSION).i32(command as i32);
    writer
}

/// Address of the authority permission account
pub fn permissions_address(program_id: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[PERMISSIONS_SEED], program_id).0
}

/// Initialize a mapping account
///
/// Accounts:
/// 0. `[signer, writable]` Funding account
/// 1. `[signer, writable]` Mapping account
pub fn init_mapping(program_id: &Pubkey, funding: &Pubkey, mapping: &Pubkey) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![AccountMeta::new(*funding, true), AccountMeta::new(*mapping, true)],
        data: command_data(Command::InitMapping).into_inner(),
    }
}

/// Attach a new product account to a mapping account
///
/// Accounts:
/// 0. `[signer, writable]` Funding account
/// 1. `[signer, writable]` Mapping account
/// 2. `[signer, writable]` New product account
pub fn add_product(
    program_id: &Pubkey,
    funding: &Pubkey,
    mapping: &Pubkey,
    product: &Pubkey,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*funding, true),
            AccountMeta::new(*mapping, true),
            AccountMeta::new(*product, true),
        ],
        data: command_data(Command::AddProduct).into_inner(),
    }
}

/// Replace product metadata
///
/// Accounts:
/// 0. `[signer, writable]` Funding account
/// 1. `[signer, writable]` Product account
///
/// Fails only if a key or value is longer than 255 bytes.
pub fn update_product(
    program_id: &Pubkey,
    funding: &Pubkey,
    product: &Pubkey,
    metadata: &[(String, String)],
) -> Result<Instruction, CodecError> {
    let mut data = command_data(Command::UpdateProduct);
    data.bytes(&encode_metadata(metadata)?);

    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![AccountMeta::new(*funding, true), AccountMeta::new(*product, true)],
        data: data.into_inner(),
    })
}

/// Attach a new price account to a product
///
/// Accounts:
/// 0. `[signer, writable]` Funding account
/// 1. `[signer, writable]` Product account
/// 2. `[signer, writable]` New price account
pub fn add_price(
    program_id: &Pubkey,
    funding: &Pubkey,
    product: &Pubkey,
    price: &Pubkey,
    exponent: i32,
) -> Instruction {
    let mut data = command_data(Command::AddPrice);
    data.i32(exponent).u32(PRICE_TYPE_PRICE);

    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*funding, true),
            AccountMeta::new(*product, true),
            AccountMeta::new(*price, true),
        ],
        data: data.into_inner(),
    }
}

/// Add (`enable`) or remove a publisher from a price account
///
/// Accounts:
/// 0. `[signer, writable]` Funding account
/// 1. `[signer, writable]` Price account
pub fn toggle_publisher(
    program_id: &Pubkey,
    funding: &Pubkey,
    price: &Pubkey,
    publisher: &Pubkey,
    enable: bool,
) -> Instruction {
    let command = if enable {
        Command::AddPublisher
    } else {
        Command::RemovePublisher
    };
    let mut data = command_data(command);
    data.pubkey(publisher);

    Instruction {
        program_id: *program_id,
        accounts: vec![AccountMeta::new(*funding, true), AccountMeta::new(*price, true)],
        data: data.into_inner(),
    }
}

/// Set the minimum number of publishers for a price
///
/// Accounts:
/// 0. `[signer, writable]` Funding account
/// 1. `[signer, writable]` Price account
pub fn set_min_publishers(
    program_id: &Pubkey,
    funding: &Pubkey,
    price: &Pubkey,
    min_publishers: u8,
) -> Instruction {
    let mut data = command_data(Command::SetMinPublishers);
    data.u8(min_publishers).bytes(&[0; 3]);

    Instruction {
        program_id: *program_id,
        accounts: vec![AccountMeta::new(*funding, true), AccountMeta::new(*price, true)],
        data: data.into_inner(),
    }
}

/// Migrate a price account to the larger v2 format
///
/// Accounts:
/// 0. `[signer, writable]` Security authority
/// 1. `[writable]` Price account
/// 2. `[]` System program
/// 3. `[]` Permission account
pub fn resize_price_account(
    program_id: &Pubkey,
    security_authority: &Pubkey,
    price: &Pubkey,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*security_authority, true),
            AccountMeta::new(*price, false),
            AccountMeta::new_readonly(system_program::id(), false),
            AccountMeta::new_readonly(permissions_address(program_id), false),
        ],
        data: command_data(Command::ResizePriceAccount).into_inner(),
    }
}

/// Delete a price account from its product
///
/// Accounts:
/// 0. `[signer, writable]` Funding account
/// 1. `[signer, writable]` Product account
/// 2. `[signer, writable]` Price account
pub fn delete_price(
    program_id: &Pubkey,
    funding: &Pubkey,
    product: &Pubkey,
    price: &Pubkey,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*funding, true),
            AccountMeta::new(*product, true),
            AccountMeta::new(*price, true),
        ],
        data: command_data(Command::DeletePrice).into_inner(),
    }
}

/// Delete a product account from its mapping
///
/// Accounts:
/// 0. `[signer, writable]` Funding account
/// 1. `[signer, writable]` Mapping account
/// 2. `[signer, writable]` Product account
pub fn delete_product(
    program_id: &Pubkey,
    funding: &Pubkey,
    mapping: &Pubkey,
    product: &Pubkey,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*funding, true),
            AccountMeta::new(*mapping, true),
            AccountMeta::new(*product, true),
        ],
        data: command_data(Command::DeleteProduct).into_inner(),
    }
}

/// Set the global authority permissions
///
/// Accounts:
/// 0. `[signer, writable]` Upgrade authority of the oracle program
/// 1. `[]` Program data account (upgradeable loader)
/// 2. `[writable]` Permission account (PDA)
/// 3. `[]` System program
pub fn update_permissions(
    program_id: &Pubkey,
    upgrade_authority: &Pubkey,
    master_authority: &Pubkey,
    data_curation_authority: &Pubkey,
    security_authority: &Pubkey,
) -> Instruction {
    let mut data = command_data(Command::UpdatePermissions);
    data.pubkey(master_authority)
        .pubkey(data_curation_authority)
        .pubkey(security_authority);

    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*upgrade_authority, true),
            AccountMeta::new_readonly(
                bpf_loader_upgradeable::get_program_data_address(program_id),
                false,
            ),
            AccountMeta::new(permissions_address(program_id), false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        data: data.into_inner(),
    }
}

/// Parsed instruction payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OracleCommand {
    InitMapping,
    AddProduct,
    UpdateProduct {
        metadata: Metadata,
    },
    AddPrice {
        exponent: i32,
        price_type: u32,
    },
    AddPublisher {
        publisher: Pubkey,
    },
    RemovePublisher {
        publisher: Pubkey,
    },
    SetMinPublishers {
        min_publishers: u8,
    },
    ResizePriceAccount,
    DeletePrice,
    DeleteProduct,
    UpdatePermissions {
        master_authority: Pubkey,
        data_curation_authority: Pubkey,
        security_authority: Pubkey,
    },
}

impl OracleCommand {
    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        let mut reader = ByteReader::new(data);
        let version = reader.read_u32()?;
        if version != VERSION {
            return Err(CodecError::UnsupportedVersion(version));
        }

        Ok(match Command::try_from(reader.read_i32()?)? {
            Command::InitMapping => OracleCommand::InitMapping,
            Command::AddProduct => OracleCommand::AddProduct,
            Command::UpdateProduct => OracleCommand::UpdateProduct {
                metadata: decode_metadata(data, COMMAND_HEADER_SIZE, data.len())?,
            },
            Command::AddPrice => OracleCommand::AddPrice {
                exponent: reader.read_i32()?,
                price_type: reader.read_u32()?,
            },
            Command::AddPublisher => OracleCommand::AddPublisher {
                publisher: reader.read_pubkey()?,
            },
            Command::RemovePublisher => OracleCommand::RemovePublisher {
                publisher: reader.read_pubkey()?,
            },
            Command::SetMinPublishers => OracleCommand::SetMinPublishers {
                min_publishers: reader.read_u8()?,
            },
            Command::ResizePriceAccount => OracleCommand::ResizePriceAccount,
            Command::DeletePrice => OracleCommand::DeletePrice,
            Command::DeleteProduct => OracleCommand::DeleteProduct,
            Command::UpdatePermissions => OracleCommand::UpdatePermissions {
                master_authority: reader.read_pubkey()?,
                data_curation_authority: reader.read_pubkey()?,
                security_authority: reader.read_pubkey()?,
            },
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            OracleCommand::InitMapping => "init_mapping",
            OracleCommand::AddProduct => "add_product",
            OracleCommand::UpdateProduct { .. } => "update_product",
            OracleCommand::AddPrice { .. } => "add_price",
            OracleCommand::AddPublisher { .. } => "add_publisher",
            OracleCommand::RemovePublisher { .. } => "remove_publisher",
            OracleCommand::SetMinPublishers { .. } => "set_min_publishers",
            OracleCommand::ResizePriceAccount => "resize_price_account",
            OracleCommand::DeletePrice => "delete_price",
            OracleCommand::DeleteProduct => "delete_product",
            OracleCommand::UpdatePermissions { .. } => "update_permissions",
        }
    }
}
