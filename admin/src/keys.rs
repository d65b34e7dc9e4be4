//! Keypair directory
//!
//! Every account keypair is stored once as `account_<pubkey>.json` (a JSON
//! array of the 64 secret key bytes). Role names such as `funding` or
//! `price_BTCUSD` are links pointing at those files.

use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signer},
};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const FUNDING_LABEL: &str = "funding";
pub const UPGRADE_AUTHORITY_LABEL: &str = "upgrade_authority";

pub fn mapping_label(index: usize) -> String {
    format!("mapping_{}", index)
}

pub fn product_label(symbol: &str) -> String {
    format!("product_{}", symbol)
}

pub fn price_label(symbol: &str) -> String {
    format!("price_{}", symbol)
}

#[derive(Debug, Error)]
pub enum KeyStoreError {
    #[error("Missing keypair (and key generation is not enabled): {0}")]
    Missing(PathBuf),

    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid keypair file {path}: {reason}")]
    Invalid { path: PathBuf, reason: String },
}

#[derive(Debug, Clone)]
pub struct KeyStore {
    dir: PathBuf,
    generate: bool,
}

impl KeyStore {
    pub fn new(dir: impl Into<PathBuf>, generate: bool) -> Self {
        Self {
            dir: dir.into(),
            generate,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn label_path(&self, label: &str) -> PathBuf {
        self.dir.join(format!("{}.json", label))
    }

    pub fn account_path(&self, pubkey: &Pubkey) -> PathBuf {
        self.dir.join(account_file_name(pubkey))
    }

    /// Load a labelled keypair, generating it if allowed
    pub fn load_label(&self, label: &str) -> Result<Keypair, KeyStoreError> {
        let path = self.label_path(label);
        if !path.exists() {
            if self.generate {
                return self.generate(label);
            }
            return Err(KeyStoreError::Missing(path));
        }
        read_keypair(&path)
    }

    /// Load a labelled keypair that must already exist
    pub fn load_existing(&self, label: &str) -> Result<Keypair, KeyStoreError> {
        let path = self.label_path(label);
        if !path.exists() {
            return Err(KeyStoreError::Missing(path));
        }
        read_keypair(&path)
    }

    pub fn load_pubkey(&self, pubkey: &Pubkey) -> Result<Keypair, KeyStoreError> {
        let path = self.account_path(pubkey);
        if !path.exists() {
            return Err(KeyStoreError::Missing(path));
        }
        read_keypair(&path)
    }

    /// Create a fresh keypair file and point `label` at it
    pub fn generate(&self, label: &str) -> Result<Keypair, KeyStoreError> {
        let keypair = Keypair::new();
        let path = self.account_path(&keypair.pubkey());
        write_keypair(&path, &keypair)?;
        self.link(&keypair.pubkey(), label)?;

        log::info!("Generated keypair {} for {}", keypair.pubkey(), label);
        Ok(keypair)
    }

    /// Recreate a label link; returns false if the label already exists
    pub fn restore_link(&self, pubkey: &Pubkey, label: &str) -> Result<bool, KeyStoreError> {
        if self.label_path(label).symlink_metadata().is_ok() {
            return Ok(false);
        }
        self.link(pubkey, label)?;
        Ok(true)
    }

    fn link(&self, pubkey: &Pubkey, label: &str) -> Result<(), KeyStoreError> {
        let link_path = self.label_path(label);

        #[cfg(unix)]
        let result = std::os::unix::fs::symlink(account_file_name(pubkey), &link_path);
        #[cfg(not(unix))]
        let result = std::fs::copy(self.account_path(pubkey), &link_path).map(|_| ());

        result.map_err(|source| KeyStoreError::Io {
            path: link_path,
            source,
        })
    }
}

fn account_file_name(pubkey: &Pubkey) -> String {
    format!("account_{}.json", pubkey)
}

fn read_keypair(path: &Path) -> Result<Keypair, KeyStoreError> {
    let bytes = std::fs::read(path).map_err(|source| KeyStoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let secret: Vec<u8> = serde_json::from_slice(&bytes).map_err(|e| KeyStoreError::Invalid {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    Keypair::try_from(&secret[..]).map_err(|e| KeyStoreError::Invalid {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn write_keypair(path: &Path, keypair: &Keypair) -> Result<(), KeyStoreError> {
    let io_err = |source| KeyStoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    let json = serde_json::to_string(&keypair.to_bytes().to_vec()).map_err(|e| {
        KeyStoreError::Invalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }
    })?;

    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(io_err)?;
    file.write_all(json.as_bytes()).map_err(io_err)
}
