//! In-memory chain for driving syncs end to end
//!
//! Applies submitted transactions with the same codec the admin uses: system
//! `create_account` plus every oracle command. Transactions are verified and
//! applied atomically.

#![allow(dead_code)]

use async_trait::async_trait;
use oracle_admin::rpc::decompile;
use oracle_admin::{KeyStore, KeyedAccount, Reference, ReferencePaths, Transport, TransportError};
use oracle_layout::{
    decode_account, permissions_address, AccountRecord, MappingRecord, OracleCommand,
    PermissionRecord, PriceAccountVersion, PriceRecord, ProductRecord, PERMISSION_ACCOUNT_SIZE,
};
use solana_sdk::{
    hash::Hash,
    instruction::Instruction,
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    system_instruction::SystemInstruction,
    system_program,
    transaction::Transaction,
};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;

pub const RENT_PER_BYTE: u64 = 10;

#[derive(Debug, Clone)]
pub struct SimAccount {
    pub owner: Pubkey,
    pub lamports: u64,
    pub data: Vec<u8>,
}

#[derive(Default)]
struct ChainState {
    accounts: HashMap<Pubkey, SimAccount>,
    transactions: usize,
    rejected_accounts: HashSet<Pubkey>,
}

pub struct SimulatedChain {
    program_id: Pubkey,
    state: Mutex<ChainState>,
}

impl SimulatedChain {
    pub fn new(program_id: Pubkey) -> Self {
        Self {
            program_id,
            state: Mutex::new(ChainState::default()),
        }
    }

    pub fn transactions(&self) -> usize {
        self.state.lock().unwrap().transactions
    }

    /// Reject every transaction that touches `account`
    pub fn reject_account(&self, account: Pubkey) {
        self.state.lock().unwrap().rejected_accounts.insert(account);
    }

    pub fn clear_rejections(&self) {
        self.state.lock().unwrap().rejected_accounts.clear();
    }

    pub fn record(&self, key: &Pubkey) -> Option<AccountRecord> {
        let state = self.state.lock().unwrap();
        let account = state.accounts.get(key)?;
        decode_account(&account.data).unwrap()
    }

    pub fn product(&self, key: &Pubkey) -> Option<ProductRecord> {
        match self.record(key)? {
            AccountRecord::Product(product) => Some(product),
            _ => None,
        }
    }

    pub fn price(&self, key: &Pubkey) -> Option<PriceRecord> {
        match self.record(key)? {
            AccountRecord::Price(price) => Some(price),
            _ => None,
        }
    }

    pub fn mappings(&self) -> Vec<(Pubkey, MappingRecord)> {
        let state = self.state.lock().unwrap();
        state
            .accounts
            .iter()
            .filter_map(|(key, account)| match decode_account(&account.data) {
                Ok(Some(AccountRecord::Mapping(mapping))) => Some((*key, mapping)),
                _ => None,
            })
            .collect()
    }

    pub fn account_count(&self) -> usize {
        self.state.lock().unwrap().accounts.len()
    }

    pub fn data_len(&self, key: &Pubkey) -> Option<usize> {
        self.state
            .lock()
            .unwrap()
            .accounts
            .get(key)
            .map(|account| account.data.len())
    }

    /// Change a price account directly, bypassing transactions
    pub fn update_price(&self, key: &Pubkey, update: impl FnOnce(&mut PriceRecord)) {
        let mut state = self.state.lock().unwrap();
        let account = state.accounts.get_mut(key).unwrap();
        let mut price = PriceRecord::decode(&account.data).unwrap();
        update(&mut price);
        write_record(account, &price.encode());
    }

    pub fn update_mapping(&self, key: &Pubkey, update: impl FnOnce(&mut MappingRecord)) {
        let mut state = self.state.lock().unwrap();
        let account = state.accounts.get_mut(key).unwrap();
        let mut mapping = MappingRecord::decode(&account.data).unwrap();
        update(&mut mapping);
        write_record(account, &mapping.encode());
    }

    /// Install a program-owned account with raw data
    pub fn insert_raw(&self, key: Pubkey, data: Vec<u8>) {
        self.state.lock().unwrap().accounts.insert(
            key,
            SimAccount {
                owner: self.program_id,
                lamports: data.len() as u64 * RENT_PER_BYTE,
                data,
            },
        );
    }

    fn apply(
        &self,
        accounts: &mut HashMap<Pubkey, SimAccount>,
        ix: &Instruction,
    ) -> Result<(), String> {
        if ix.program_id == system_program::id() {
            return apply_system(accounts, ix);
        }
        if ix.program_id != self.program_id {
            return Err(format!("unknown program {}", ix.program_id));
        }

        let command = OracleCommand::decode(&ix.data).map_err(|e| e.to_string())?;
        let key = |index: usize| {
            ix.accounts
                .get(index)
                .map(|meta| meta.pubkey)
                .ok_or_else(|| format!("missing account {}", index))
        };

        match command {
            OracleCommand::InitMapping => {
                let mapping = owned(accounts, &key(1)?, self.program_id)?;
                ensure_uninitialized(mapping)?;
                write_record(mapping, &MappingRecord::new().encode());
            }
            OracleCommand::AddProduct => {
                let (mapping_key, product_key) = (key(1)?, key(2)?);
                let mut mapping = match decode(accounts, &mapping_key)? {
                    AccountRecord::Mapping(mapping) => mapping,
                    other => return Err(format!("not a mapping: {:?}", other.kind())),
                };
                if mapping.is_full() {
                    return Err("mapping full".to_string());
                }
                let product = owned(accounts, &product_key, self.program_id)?;
                ensure_uninitialized(product)?;
                write_record(product, &ProductRecord::new().encode().map_err(|e| e.to_string())?);

                mapping.push_product(product_key);
                write_record(accounts.get_mut(&mapping_key).ok_or("mapping")?, &mapping.encode());
            }
            OracleCommand::UpdateProduct { metadata } => {
                let product_key = key(1)?;
                let mut product = expect_product(accounts, &product_key)?;
                product.set_metadata(metadata).map_err(|e| e.to_string())?;
                let bytes = product.encode().map_err(|e| e.to_string())?;
                write_record(accounts.get_mut(&product_key).ok_or("product")?, &bytes);
            }
            OracleCommand::AddPrice {
                exponent,
                price_type,
            } => {
                let (product_key, price_key) = (key(1)?, key(2)?);
                let mut product = expect_product(accounts, &product_key)?;

                let price_account = owned(accounts, &price_key, self.program_id)?;
                ensure_uninitialized(price_account)?;
                let mut price = PriceRecord::new(product_key, exponent, price_type);
                price.next_price_key = product.first_price_key;
                write_record(price_account, &price.encode());

                product.first_price_key = price_key;
                let bytes = product.encode().map_err(|e| e.to_string())?;
                write_record(accounts.get_mut(&product_key).ok_or("product")?, &bytes);
            }
            OracleCommand::AddPublisher { publisher } => {
                self.modify_price(accounts, &key(1)?, |price| {
                    if !price.add_publisher(publisher) {
                        return Err("publisher already present".to_string());
                    }
                    Ok(())
                })?;
            }
            OracleCommand::RemovePublisher { publisher } => {
                self.modify_price(accounts, &key(1)?, |price| {
                    if !price.remove_publisher(&publisher) {
                        return Err("publisher not present".to_string());
                    }
                    Ok(())
                })?;
            }
            OracleCommand::SetMinPublishers { min_publishers } => {
                self.modify_price(accounts, &key(1)?, |price| {
                    price.min_publishers = min_publishers;
                    Ok(())
                })?;
            }
            OracleCommand::ResizePriceAccount => {
                let price = owned(accounts, &key(1)?, self.program_id)?;
                price.data.resize(PriceAccountVersion::V2.size(), 0);
            }
            OracleCommand::DeletePrice => {
                let (product_key, price_key) = (key(1)?, key(2)?);
                let mut product = expect_product(accounts, &product_key)?;
                let price = match decode(accounts, &price_key)? {
                    AccountRecord::Price(price) => price,
                    other => return Err(format!("not a price: {:?}", other.kind())),
                };
                if product.first_price_key != price_key {
                    return Err("price is not the product's first price".to_string());
                }
                product.first_price_key = price.next_price_key;
                let bytes = product.encode().map_err(|e| e.to_string())?;
                write_record(accounts.get_mut(&product_key).ok_or("product")?, &bytes);
                accounts.remove(&price_key);
            }
            OracleCommand::DeleteProduct => {
                let (mapping_key, product_key) = (key(1)?, key(2)?);
                let product = expect_product(accounts, &product_key)?;
                if product.first_price_key != Pubkey::default() {
                    return Err("product still has prices".to_string());
                }
                let mut mapping = match decode(accounts, &mapping_key)? {
                    AccountRecord::Mapping(mapping) => mapping,
                    other => return Err(format!("not a mapping: {:?}", other.kind())),
                };
                if !mapping.remove_product(&product_key) {
                    return Err("product not in mapping".to_string());
                }
                write_record(accounts.get_mut(&mapping_key).ok_or("mapping")?, &mapping.encode());
                accounts.remove(&product_key);
            }
            OracleCommand::UpdatePermissions {
                master_authority,
                data_curation_authority,
                security_authority,
            } => {
                let address = key(2)?;
                if address != permissions_address(&self.program_id) {
                    return Err("wrong permissions address".to_string());
                }
                let record = PermissionRecord {
                    master_authority,
                    data_curation_authority,
                    security_authority,
                };
                let account = accounts.entry(address).or_insert_with(|| SimAccount {
                    owner: self.program_id,
                    lamports: PERMISSION_ACCOUNT_SIZE as u64 * RENT_PER_BYTE,
                    data: vec![0; PERMISSION_ACCOUNT_SIZE],
                });
                write_record(account, &record.encode());
            }
        }

        Ok(())
    }

    fn modify_price(
        &self,
        accounts: &mut HashMap<Pubkey, SimAccount>,
        key: &Pubkey,
        update: impl FnOnce(&mut PriceRecord) -> Result<(), String>,
    ) -> Result<(), String> {
        let mut price = match decode(accounts, key)? {
            AccountRecord::Price(price) => price,
            other => return Err(format!("not a price: {:?}", other.kind())),
        };
        update(&mut price)?;
        write_record(accounts.get_mut(key).ok_or("price")?, &price.encode());
        Ok(())
    }
}

fn apply_system(accounts: &mut HashMap<Pubkey, SimAccount>, ix: &Instruction) -> Result<(), String> {
    let instruction: SystemInstruction =
        bincode::deserialize(&ix.data).map_err(|e| e.to_string())?;

    match instruction {
        SystemInstruction::CreateAccount {
            lamports,
            space,
            owner,
        } => {
            let new_account = ix.accounts.get(1).ok_or("missing new account")?.pubkey;
            if accounts.contains_key(&new_account) {
                return Err(format!("account {} already exists", new_account));
            }
            if lamports < space * RENT_PER_BYTE {
                return Err("insufficient rent".to_string());
            }
            accounts.insert(
                new_account,
                SimAccount {
                    owner,
                    lamports,
                    data: vec![0; space as usize],
                },
            );
            Ok(())
        }
        other => Err(format!("unsupported system instruction {:?}", other)),
    }
}

fn owned<'a>(
    accounts: &'a mut HashMap<Pubkey, SimAccount>,
    key: &Pubkey,
    program_id: Pubkey,
) -> Result<&'a mut SimAccount, String> {
    let account = accounts
        .get_mut(key)
        .ok_or_else(|| format!("account {} does not exist", key))?;
    if account.owner != program_id {
        return Err(format!("account {} not owned by program", key));
    }
    Ok(account)
}

fn ensure_uninitialized(account: &SimAccount) -> Result<(), String> {
    if account.data.iter().any(|&b| b != 0) {
        return Err("account already initialized".to_string());
    }
    Ok(())
}

fn decode(accounts: &HashMap<Pubkey, SimAccount>, key: &Pubkey) -> Result<AccountRecord, String> {
    let account = accounts
        .get(key)
        .ok_or_else(|| format!("account {} does not exist", key))?;
    decode_account(&account.data)
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("account {} is not initialized", key))
}

fn expect_product(
    accounts: &HashMap<Pubkey, SimAccount>,
    key: &Pubkey,
) -> Result<ProductRecord, String> {
    match decode(accounts, key)? {
        AccountRecord::Product(product) => Ok(product),
        other => Err(format!("not a product: {:?}", other.kind())),
    }
}

fn write_record(account: &mut SimAccount, bytes: &[u8]) {
    account.data.fill(0);
    account.data[..bytes.len()].copy_from_slice(bytes);
}

#[async_trait]
impl Transport for SimulatedChain {
    async fn fetch_program_accounts(
        &self,
        program_id: &Pubkey,
    ) -> Result<Vec<KeyedAccount>, TransportError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .accounts
            .iter()
            .filter(|(_, account)| account.owner == *program_id)
            .map(|(key, account)| KeyedAccount {
                pubkey: *key,
                owner: account.owner,
                lamports: account.lamports,
                data: account.data.clone(),
            })
            .collect())
    }

    async fn latest_blockhash(&self) -> Result<Hash, TransportError> {
        Ok(Hash::default())
    }

    async fn submit(&self, transaction: &Transaction) -> Result<Signature, TransportError> {
        transaction
            .verify()
            .map_err(|e| TransportError::Rejected(format!("signature check failed: {}", e)))?;

        let mut state = self.state.lock().unwrap();
        let instructions = decompile(&transaction.message);

        if instructions
            .iter()
            .flat_map(|ix| ix.accounts.iter())
            .any(|meta| state.rejected_accounts.contains(&meta.pubkey))
        {
            return Err(TransportError::Rejected("account is blocked".to_string()));
        }

        let mut accounts = state.accounts.clone();
        for ix in &instructions {
            self.apply(&mut accounts, ix)
                .map_err(TransportError::Rejected)?;
        }

        state.accounts = accounts;
        state.transactions += 1;
        Ok(transaction.signatures[0])
    }

    async fn minimum_rent_exempt_balance(&self, size: usize) -> Result<u64, TransportError> {
        Ok(size as u64 * RENT_PER_BYTE)
    }
}

/// A temporary key directory and reference files around a simulated chain
pub struct Harness {
    pub program_id: Pubkey,
    pub chain: SimulatedChain,
    pub keys: KeyStore,
    pub dir: TempDir,
    pub publishers: HashMap<String, Keypair>,
}

impl Harness {
    pub fn new() -> Self {
        let program_id = Pubkey::new_unique();
        let dir = tempfile::tempdir().unwrap();
        let key_dir = dir.path().join("keys");
        std::fs::create_dir(&key_dir).unwrap();

        let keys = KeyStore::new(&key_dir, true);
        keys.generate("funding").unwrap();
        keys.generate("upgrade_authority").unwrap();

        let publishers = ["A", "B", "C"]
            .iter()
            .map(|name| (name.to_string(), Keypair::new()))
            .collect();

        Self {
            program_id,
            chain: SimulatedChain::new(program_id),
            keys,
            dir,
            publishers,
        }
    }

    pub fn publisher(&self, name: &str) -> Pubkey {
        self.publishers[name].pubkey()
    }

    pub fn label_pubkey(&self, label: &str) -> Pubkey {
        self.keys.load_existing(label).unwrap().pubkey()
    }

    fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    /// Write reference files and load them for devnet
    ///
    /// `products` is `(jump_symbol, exponent, min_publishers)`, `permissions`
    /// is `(jump_symbol, publisher names)`.
    pub fn reference(
        &self,
        products: &[(&str, i32, Option<u8>)],
        permissions: &[(&str, &[&str])],
        overrides: Option<&str>,
        authority: Option<&str>,
    ) -> Reference {
        let products_json: Vec<serde_json::Value> = products
            .iter()
            .map(|(symbol, exponent, min_publishers)| {
                let mut metadata = serde_json::json!({
                    "jump_symbol": symbol,
                    "price_exp": exponent,
                });
                if let Some(min) = min_publishers {
                    metadata["min_publishers"] = serde_json::json!(min);
                }
                serde_json::json!({
                    "metadata": metadata,
                    "attr_dict": {
                        "symbol": format!("Crypto.{}", symbol),
                        "asset_type": "Crypto",
                        "base": symbol,
                    },
                })
            })
            .collect();

        let publishers_json: serde_json::Map<String, serde_json::Value> = self
            .publishers
            .iter()
            .map(|(name, keypair)| (name.clone(), keypair.pubkey().to_string().into()))
            .collect();

        let permissions_json: serde_json::Map<String, serde_json::Value> = permissions
            .iter()
            .map(|(symbol, names)| (symbol.to_string(), serde_json::json!({ "price": names })))
            .collect();

        let paths = ReferencePaths {
            products: self.write(
                "products.json",
                &serde_json::to_string(&products_json).unwrap(),
            ),
            publishers: self.write(
                "publishers.json",
                &serde_json::to_string(&publishers_json).unwrap(),
            ),
            permissions: self.write(
                "permissions.json",
                &serde_json::to_string(&permissions_json).unwrap(),
            ),
            overrides: overrides.map(|text| self.write("overrides.json", text)),
            authority_permissions: authority.map(|text| self.write("authority.json", text)),
        };

        Reference::load(&paths, oracle_admin::Network::Devnet).unwrap()
    }

    pub fn products_path(&self) -> PathBuf {
        self.dir.path().join("products.json")
    }

    pub fn key_dir(&self) -> &Path {
        self.keys.dir()
    }
}
