//! Error types for the admin library

use crate::keys::KeyStoreError;
use crate::mapping::BrokenChainError;
use crate::reference::ReferenceError;
use crate::rpc::TransportError;
use oracle_layout::CodecError;
use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

/// Failure of a sync run or admin command
///
/// Nothing here is retried. Re-running the sync is the recovery path: every
/// plan is derived from a fresh diff, so a partially applied run converges on
/// the next attempt.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Broken mapping chain: {0}")]
    BrokenChain(#[from] BrokenChainError),

    #[error("Reference error: {0}")]
    Reference(#[from] ReferenceError),

    #[error("Key store error: {0}")]
    KeyStore(#[from] KeyStoreError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("No keypair available for {0}")]
    MissingKeypair(String),

    #[error("Account {0} not found among program accounts")]
    MissingAccount(Pubkey),

    #[error("Program has no mapping accounts")]
    EmptyChain,
}

pub type Result<T> = std::result::Result<T, SyncError>;
