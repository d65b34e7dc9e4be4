//! Reference model
//!
//! The declarative target a sync converges on. Loaded from four JSON files
//! (products, publishers, permissions, overrides) plus an optional authority
//! permissions file, then validated before anything touches the network.

use crate::config::Network;
use oracle_layout::Metadata;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// `jump_symbol -> account kind ("price") -> publisher names`
pub type ReferencePermissions = BTreeMap<String, BTreeMap<String, Vec<String>>>;

/// `network -> jump_symbol -> enabled`
pub type ReferenceOverrides = HashMap<String, HashMap<String, bool>>;

#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid public key for publisher {name}: {value}")]
    InvalidPubkey { name: String, value: String },

    #[error("Publisher key {key} is assigned to both {first} and {second}")]
    DuplicatePublisherKey {
        key: Pubkey,
        first: String,
        second: String,
    },

    #[error("Product {0} is listed more than once")]
    DuplicateSymbol(String),

    #[error("Symbol {0} has permissions but no product")]
    UnknownSymbol(String),

    #[error("Symbol {symbol} names publisher {publisher} missing from the publishers file")]
    MissingKey { symbol: String, publisher: String },
}

/// A product as it should exist on chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceProduct {
    pub jump_symbol: String,
    pub exponent: i32,
    /// Product attributes in file order
    pub metadata: Metadata,
    /// `None` leaves the on-chain value alone
    pub min_publishers: Option<u8>,
}

impl ReferenceProduct {
    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Deserialize)]
struct ProductEntry {
    metadata: ProductEntryMetadata,
    attr_dict: serde_json::Map<String, serde_json::Value>,
}

#[derive(Deserialize)]
struct ProductEntryMetadata {
    jump_symbol: String,
    price_exp: i32,
    #[serde(default)]
    min_publishers: Option<u8>,
}

impl From<ProductEntry> for ReferenceProduct {
    fn from(entry: ProductEntry) -> Self {
        let metadata = entry
            .attr_dict
            .into_iter()
            .map(|(key, value)| match value {
                serde_json::Value::String(s) => (key, s),
                other => (key, other.to_string()),
            })
            .collect();

        Self {
            jump_symbol: entry.metadata.jump_symbol,
            exponent: entry.metadata.price_exp,
            metadata,
            min_publishers: entry.metadata.min_publishers,
        }
    }
}

/// Publisher names and keys, unique in both directions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferencePublishers {
    pub keys: BTreeMap<String, Pubkey>,
    pub names: HashMap<Pubkey, String>,
}

impl ReferencePublishers {
    pub fn from_map(entries: BTreeMap<String, String>) -> Result<Self, ReferenceError> {
        let mut publishers = Self::default();

        for (name, value) in entries {
            let key = Pubkey::from_str(&value).map_err(|_| ReferenceError::InvalidPubkey {
                name: name.clone(),
                value: value.clone(),
            })?;

            if let Some(first) = publishers.names.get(&key) {
                return Err(ReferenceError::DuplicatePublisherKey {
                    key,
                    first: first.clone(),
                    second: name,
                });
            }

            publishers.names.insert(key, name.clone());
            publishers.keys.insert(name, key);
        }

        Ok(publishers)
    }

    /// Display name, or the key itself for unknown publishers
    pub fn name_of(&self, key: &Pubkey) -> String {
        self.names
            .get(key)
            .cloned()
            .unwrap_or_else(|| format!("??? ({})", key))
    }
}

/// Target values of the authority permission account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceAuthorityPermissions {
    #[serde(with = "pubkey_string")]
    pub master_authority: Pubkey,
    #[serde(with = "pubkey_string")]
    pub data_curation_authority: Pubkey,
    #[serde(with = "pubkey_string")]
    pub security_authority: Pubkey,
}

/// Serde adapter for base58 public keys
pub mod pubkey_string {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use solana_sdk::pubkey::Pubkey;
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(key: &Pubkey, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(key)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Pubkey, D::Error> {
        let value = String::deserialize(deserializer)?;
        Pubkey::from_str(&value).map_err(de::Error::custom)
    }
}

/// Force the publisher lists of symbols disabled on `network` to empty
///
/// Symbols absent from the network's overrides, or set to `true`, keep their
/// permissions. Overrides for other networks are ignored.
pub fn apply_overrides(
    permissions: &ReferencePermissions,
    overrides: &ReferenceOverrides,
    network: Network,
) -> ReferencePermissions {
    let mut effective = permissions.clone();

    if let Some(network_overrides) = overrides.get(network.as_str()) {
        for (symbol, enabled) in network_overrides {
            if *enabled {
                continue;
            }
            if let Some(accounts) = effective.get_mut(symbol) {
                accounts.values_mut().for_each(Vec::clear);
            }
        }
    }

    effective
}

/// Locations of the reference files
#[derive(Debug, Clone)]
pub struct ReferencePaths {
    pub products: PathBuf,
    pub publishers: PathBuf,
    pub permissions: PathBuf,
    pub overrides: Option<PathBuf>,
    pub authority_permissions: Option<PathBuf>,
}

/// Validated reference model with overrides applied
#[derive(Debug, Clone)]
pub struct Reference {
    pub products: BTreeMap<String, ReferenceProduct>,
    pub publishers: ReferencePublishers,
    pub permissions: ReferencePermissions,
    pub authority_permissions: Option<ReferenceAuthorityPermissions>,
}

impl Reference {
    pub fn new(
        products: Vec<ReferenceProduct>,
        publishers: ReferencePublishers,
        permissions: ReferencePermissions,
        overrides: &ReferenceOverrides,
        network: Network,
        authority_permissions: Option<ReferenceAuthorityPermissions>,
    ) -> Result<Self, ReferenceError> {
        let mut by_symbol = BTreeMap::new();
        for product in products {
            let symbol = product.jump_symbol.clone();
            if by_symbol.insert(symbol.clone(), product).is_some() {
                return Err(ReferenceError::DuplicateSymbol(symbol));
            }
        }

        let reference = Self {
            products: by_symbol,
            publishers,
            permissions: apply_overrides(&permissions, overrides, network),
            authority_permissions,
        };
        reference.validate()?;

        Ok(reference)
    }

    pub fn load(paths: &ReferencePaths, network: Network) -> Result<Self, ReferenceError> {
        let products = parse_products(&read_file(&paths.products)?, &paths.products)?;
        let publishers = ReferencePublishers::from_map(parse_json(&paths.publishers)?)?;
        let permissions: ReferencePermissions = parse_json(&paths.permissions)?;
        let overrides: ReferenceOverrides = match &paths.overrides {
            Some(path) => parse_json(path)?,
            None => ReferenceOverrides::new(),
        };
        let authority_permissions = match &paths.authority_permissions {
            Some(path) => Some(parse_json(path)?),
            None => None,
        };

        log::info!(
            "Loaded {} products, {} publishers, {} permission entries",
            products.len(),
            publishers.keys.len(),
            permissions.len()
        );

        Self::new(
            products,
            publishers,
            permissions,
            &overrides,
            network,
            authority_permissions,
        )
    }

    fn validate(&self) -> Result<(), ReferenceError> {
        for (symbol, accounts) in &self.permissions {
            if !self.products.contains_key(symbol) {
                return Err(ReferenceError::UnknownSymbol(symbol.clone()));
            }

            for publisher in accounts.values().flatten() {
                if !self.publishers.keys.contains_key(publisher) {
                    return Err(ReferenceError::MissingKey {
                        symbol: symbol.clone(),
                        publisher: publisher.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Symbols to synchronize, sorted
    pub fn symbols(&self) -> impl Iterator<Item = &str> + '_ {
        self.permissions.keys().map(String::as_str)
    }

    pub fn product(&self, symbol: &str) -> Result<&ReferenceProduct, ReferenceError> {
        self.products
            .get(symbol)
            .ok_or_else(|| ReferenceError::UnknownSymbol(symbol.to_string()))
    }

    /// Publisher keys wanted on the symbol's price account
    pub fn publisher_keys(&self, symbol: &str) -> Result<BTreeSet<Pubkey>, ReferenceError> {
        let names = self
            .permissions
            .get(symbol)
            .and_then(|accounts| accounts.get("price"))
            .map(Vec::as_slice)
            .unwrap_or_default();

        names
            .iter()
            .map(|name| {
                self.publishers
                    .keys
                    .get(name)
                    .copied()
                    .ok_or_else(|| ReferenceError::MissingKey {
                        symbol: symbol.to_string(),
                        publisher: name.clone(),
                    })
            })
            .collect()
    }
}

fn read_file(path: &Path) -> Result<String, ReferenceError> {
    std::fs::read_to_string(path).map_err(|source| ReferenceError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ReferenceError> {
    serde_json::from_str(&read_file(path)?).map_err(|source| ReferenceError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse a products file (`[{metadata: {...}, attr_dict: {...}}]`)
pub fn parse_products(text: &str, path: &Path) -> Result<Vec<ReferenceProduct>, ReferenceError> {
    let entries: Vec<ProductEntry> =
        serde_json::from_str(text).map_err(|source| ReferenceError::Json {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(entries.into_iter().map(ReferenceProduct::from).collect())
}
