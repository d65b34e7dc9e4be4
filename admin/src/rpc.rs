//! Cluster transport
//!
//! [`Transport`] is the only boundary where a sync suspends. [`RpcTransport`]
//! talks to a validator; [`DumpTransport`] records what would have been sent.

use async_trait::async_trait;
use oracle_layout::OracleCommand;
use serde::Serialize;
use solana_account_decoder::UiAccountEncoding;
use solana_client::{
    client_error::ClientError,
    nonblocking::rpc_client::RpcClient,
    rpc_config::{RpcAccountInfoConfig, RpcProgramAccountsConfig},
};
use solana_sdk::{
    commitment_config::CommitmentConfig,
    hash::Hash,
    instruction::{AccountMeta, Instruction},
    message::Message,
    pubkey::Pubkey,
    signature::Signature,
    signer::SignerError,
    system_program,
    transaction::Transaction,
};
use std::path::Path;
use thiserror::Error;
use tokio::sync::Mutex;

/// A program-owned account as returned by the cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyedAccount {
    pub pubkey: Pubkey,
    pub owner: Pubkey,
    pub lamports: u64,
    pub data: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("RPC error: {0}")]
    Rpc(#[from] ClientError),

    #[error("Transaction rejected: {0}")]
    Rejected(String),

    #[error("Signing error: {0}")]
    Signing(#[from] SignerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch_program_accounts(
        &self,
        program_id: &Pubkey,
    ) -> Result<Vec<KeyedAccount>, TransportError>;

    async fn latest_blockhash(&self) -> Result<Hash, TransportError>;

    /// Submit a signed transaction and wait for confirmation
    async fn submit(&self, transaction: &Transaction) -> Result<Signature, TransportError>;

    async fn minimum_rent_exempt_balance(&self, size: usize) -> Result<u64, TransportError>;
}

pub struct RpcTransport {
    client: RpcClient,
}

impl RpcTransport {
    pub fn new(url: String, commitment: CommitmentConfig) -> Self {
        Self {
            client: RpcClient::new_with_commitment(url, commitment),
        }
    }
}

#[async_trait]
impl Transport for RpcTransport {
    async fn fetch_program_accounts(
        &self,
        program_id: &Pubkey,
    ) -> Result<Vec<KeyedAccount>, TransportError> {
        let config = RpcProgramAccountsConfig {
            account_config: RpcAccountInfoConfig {
                encoding: Some(UiAccountEncoding::Base64),
                commitment: Some(self.client.commitment()),
                ..RpcAccountInfoConfig::default()
            },
            ..RpcProgramAccountsConfig::default()
        };

        let accounts = self
            .client
            .get_program_accounts_with_config(program_id, config)
            .await?;

        log::debug!("Fetched {} accounts owned by {}", accounts.len(), program_id);

        Ok(accounts
            .into_iter()
            .map(|(pubkey, account)| KeyedAccount {
                pubkey,
                owner: account.owner,
                lamports: account.lamports,
                data: account.data,
            })
            .collect())
    }

    async fn latest_blockhash(&self) -> Result<Hash, TransportError> {
        Ok(self.client.get_latest_blockhash().await?)
    }

    async fn submit(&self, transaction: &Transaction) -> Result<Signature, TransportError> {
        Ok(self.client.send_and_confirm_transaction(transaction).await?)
    }

    async fn minimum_rent_exempt_balance(&self, size: usize) -> Result<u64, TransportError> {
        Ok(self
            .client
            .get_minimum_balance_for_rent_exemption(size)
            .await?)
    }
}

/// Rebuild the instructions of a legacy message
pub fn decompile(message: &Message) -> Vec<Instruction> {
    let header = &message.header;
    let signed = header.num_required_signatures as usize;
    let writable_signed = signed.saturating_sub(header.num_readonly_signed_accounts as usize);
    let writable_unsigned = message
        .account_keys
        .len()
        .saturating_sub(header.num_readonly_unsigned_accounts as usize);

    let meta = |index: usize| {
        let pubkey = message.account_keys[index];
        let is_signer = index < signed;
        let is_writable = if is_signer {
            index < writable_signed
        } else {
            index < writable_unsigned
        };
        AccountMeta {
            pubkey,
            is_signer,
            is_writable,
        }
    };

    message
        .instructions
        .iter()
        .map(|compiled| Instruction {
            program_id: message.account_keys[compiled.program_id_index as usize],
            accounts: compiled
                .accounts
                .iter()
                .map(|&index| meta(index as usize))
                .collect(),
            data: compiled.data.clone(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DumpedAccount {
    pub pubkey: String,
    pub is_signer: bool,
    pub is_writable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DumpedInstruction {
    pub command: String,
    pub program_id: String,
    pub accounts: Vec<DumpedAccount>,
    /// base58 payload
    pub data: String,
}

impl From<&Instruction> for DumpedInstruction {
    fn from(instruction: &Instruction) -> Self {
        let command = if instruction.program_id == system_program::id() {
            "system_create_account".to_string()
        } else {
            OracleCommand::decode(&instruction.data)
                .map(|command| command.name().to_string())
                .unwrap_or_else(|_| "unknown".to_string())
        };

        Self {
            command,
            program_id: instruction.program_id.to_string(),
            accounts: instruction
                .accounts
                .iter()
                .map(|meta| DumpedAccount {
                    pubkey: meta.pubkey.to_string(),
                    is_signer: meta.is_signer,
                    is_writable: meta.is_writable,
                })
                .collect(),
            data: bs58::encode(&instruction.data).into_string(),
        }
    }
}

/// Reads through to `inner`, records submissions instead of sending them
pub struct DumpTransport<T> {
    inner: T,
    recorded: Mutex<Vec<DumpedInstruction>>,
}

impl<T: Transport> DumpTransport<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            recorded: Mutex::new(Vec::new()),
        }
    }

    pub async fn recorded(&self) -> Vec<DumpedInstruction> {
        self.recorded.lock().await.clone()
    }

    /// Write recorded instructions as a JSON array
    pub async fn write(&self, path: &Path) -> Result<usize, TransportError> {
        let recorded = self.recorded.lock().await;
        std::fs::write(path, serde_json::to_string_pretty(&*recorded)?)?;
        log::info!("Wrote {} instructions to {}", recorded.len(), path.display());
        Ok(recorded.len())
    }
}

#[async_trait]
impl<T: Transport> Transport for DumpTransport<T> {
    async fn fetch_program_accounts(
        &self,
        program_id: &Pubkey,
    ) -> Result<Vec<KeyedAccount>, TransportError> {
        self.inner.fetch_program_accounts(program_id).await
    }

    async fn latest_blockhash(&self) -> Result<Hash, TransportError> {
        self.inner.latest_blockhash().await
    }

    async fn submit(&self, transaction: &Transaction) -> Result<Signature, TransportError> {
        let instructions = decompile(&transaction.message);
        log::info!("Recording {} instructions (not sent)", instructions.len());

        self.recorded
            .lock()
            .await
            .extend(instructions.iter().map(DumpedInstruction::from));

        Ok(transaction.signatures.first().copied().unwrap_or_default())
    }

    async fn minimum_rent_exempt_balance(&self, size: usize) -> Result<u64, TransportError> {
        self.inner.minimum_rent_exempt_balance(size).await
    }
}
