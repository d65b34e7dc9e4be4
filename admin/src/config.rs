//! Admin configuration

use crate::reference::pubkey_string;
use anyhow::{Context, Result};
use oracle_layout::PriceAccountVersion;
use serde::{Deserialize, Serialize};
use solana_sdk::{commitment_config::CommitmentConfig, pubkey::Pubkey};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "ORACLE_ADMIN_CONFIG";

/// Default config file name
pub const DEFAULT_CONFIG_PATH: &str = "oracle-admin.toml";

/// Cluster the oracle lives on; also the key into the overrides file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Network {
    Devnet,
    Localhost,
    MainnetBeta,
    Testnet,
    Pythtest,
    Pythnet,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Devnet => "devnet",
            Network::Localhost => "localhost",
            Network::MainnetBeta => "mainnet-beta",
            Network::Testnet => "testnet",
            Network::Pythtest => "pythtest",
            Network::Pythnet => "pythnet",
        }
    }

    /// Public RPC endpoint, if the cluster has one
    pub fn default_rpc_url(&self) -> Option<&'static str> {
        match self {
            Network::Devnet => Some("https://api.devnet.solana.com"),
            Network::Localhost => Some("http://127.0.0.1:8899"),
            Network::MainnetBeta => Some("https://api.mainnet-beta.solana.com"),
            Network::Testnet => Some("https://api.testnet.solana.com"),
            Network::Pythtest | Network::Pythnet => None,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Confirmed,
    Finalized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceFormat {
    #[default]
    V1,
    V2,
}

impl From<PriceFormat> for PriceAccountVersion {
    fn from(format: PriceFormat) -> Self {
        match format {
            PriceFormat::V1 => PriceAccountVersion::V1,
            PriceFormat::V2 => PriceAccountVersion::V2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Cluster name, selects overrides and the default RPC endpoint
    pub network: Network,

    /// RPC URL; required for clusters without a public endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpc_url: Option<String>,

    /// Oracle program ID
    #[serde(with = "pubkey_string")]
    pub program_key: Pubkey,

    /// Directory holding funding, mapping, product and price keypairs
    pub key_dir: String,

    /// Confirmation level for reads and submissions
    pub commitment: Commitment,

    /// Format new price accounts are sized for
    #[serde(default)]
    pub price_account_version: PriceFormat,

    /// Allow creating keypairs for new mapping/product/price accounts
    #[serde(default)]
    pub generate_keys: bool,
}

impl Config {
    /// Load configuration from TOML file
    ///
    /// Path resolution: explicit path, then `ORACLE_ADMIN_CONFIG`, then
    /// `oracle-admin.toml` in the working directory.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let config_path = match path {
            Some(path) => path.to_string(),
            None => std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string()),
        };

        let config_str = std::fs::read_to_string(&config_path)
            .context(format!("Failed to read config file: {}", config_path))?;

        let config: Config = toml::from_str(&config_str).context("Failed to parse config TOML")?;

        Ok(config)
    }

    /// Load configuration, falling back to devnet defaults
    ///
    /// Only a missing file at the default location falls back; a config that
    /// was asked for explicitly must exist and parse.
    pub fn load_or_default(path: Option<&str>) -> Result<Self> {
        let explicit = path.is_some() || std::env::var_os(CONFIG_ENV).is_some();
        if !explicit && !std::path::Path::new(DEFAULT_CONFIG_PATH).exists() {
            log::warn!("No {} found, using default devnet config", DEFAULT_CONFIG_PATH);
            return Ok(Self::default_devnet());
        }
        Self::load(path)
    }

    /// Create default configuration
    pub fn default_devnet() -> Self {
        Self {
            network: Network::Devnet,
            rpc_url: None,
            program_key: Pubkey::from_str("gSbePebfvPy7tRqimPoVecS2UsBvYv46ynrzWocc92s")
                .unwrap_or_default(),
            key_dir: "./keys".to_string(),
            commitment: Commitment::Finalized,
            price_account_version: PriceFormat::V1,
            generate_keys: false,
        }
    }

    /// Write default config to file
    pub fn write_default(path: &str) -> Result<()> {
        let config = Self::default_devnet();
        let toml_str = toml::to_string_pretty(&config).context("Failed to serialize config")?;

        std::fs::write(path, toml_str).context(format!("Failed to write config to {}", path))?;

        log::info!("Created default config at {}", path);
        Ok(())
    }

    /// RPC endpoint, falling back to the network's public endpoint
    pub fn rpc_endpoint(&self) -> Result<String> {
        match (&self.rpc_url, self.network.default_rpc_url()) {
            (Some(url), _) => Ok(url.clone()),
            (None, Some(url)) => Ok(url.to_string()),
            (None, None) => anyhow::bail!("rpc_url is required for network {}", self.network),
        }
    }

    pub fn commitment_config(&self) -> CommitmentConfig {
        match self.commitment {
            Commitment::Confirmed => CommitmentConfig::confirmed(),
            Commitment::Finalized => CommitmentConfig::finalized(),
        }
    }

    /// Key directory with `~` expanded
    pub fn key_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.key_dir).as_ref())
    }
}
