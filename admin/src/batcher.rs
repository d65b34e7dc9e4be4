//! Transaction batching
//!
//! The marginal wire size of an instruction is only known after it has been
//! appended, and appended instructions cannot be taken back out. Batches are
//! therefore closed once the running size reaches half the packet limit, which
//! leaves room for one more instruction of up to that size.

use crate::rpc::{Transport, TransportError};
use solana_sdk::{
    instruction::Instruction,
    message::Message,
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    transaction::Transaction,
};
use std::collections::HashMap;
use std::sync::Arc;

pub use solana_sdk::packet::PACKET_DATA_SIZE;

/// Running size at which a batch is closed
pub const BATCH_SIZE_LIMIT: usize = PACKET_DATA_SIZE / 2;

/// Serialized size of the transaction carrying `instructions`, signatures included
pub fn transaction_size(instructions: &[Instruction], payer: &Pubkey) -> usize {
    let transaction = Transaction::new_unsigned(Message::new(instructions, Some(payer)));
    bincode::serialized_size(&transaction)
        .map(|size| size as usize)
        .unwrap_or(usize::MAX)
}

/// Length of the next batch taken from the front of `instructions`
///
/// Always at least one instruction for non-empty input.
pub fn next_batch_len(instructions: &[Instruction], payer: &Pubkey) -> usize {
    let mut len = instructions.len().min(1);
    while len < instructions.len() && transaction_size(&instructions[..len], payer) < BATCH_SIZE_LIMIT
    {
        len += 1;
    }
    len
}

/// Split `instructions` into consecutive size-bounded batches
pub fn split_batches(instructions: &[Instruction], payer: &Pubkey) -> Vec<Vec<Instruction>> {
    let mut batches = Vec::new();
    let mut remaining = instructions;

    while !remaining.is_empty() {
        let (batch, rest) = remaining.split_at(next_batch_len(remaining, payer));
        batches.push(batch.to_vec());
        remaining = rest;
    }

    batches
}

/// Keypairs available for signing, by public key
#[derive(Clone, Default)]
pub struct SignerSet {
    keypairs: HashMap<Pubkey, Arc<Keypair>>,
}

impl SignerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, keypair: Arc<Keypair>) {
        self.keypairs.insert(keypair.pubkey(), keypair);
    }

    pub fn contains(&self, pubkey: &Pubkey) -> bool {
        self.keypairs.contains_key(pubkey)
    }

    pub fn len(&self) -> usize {
        self.keypairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypairs.is_empty()
    }

    /// Keypairs for the payer and every signer referenced by `instructions`
    ///
    /// Referenced signers without a keypair are left out; the submission
    /// rejects the transaction.
    pub fn select(&self, instructions: &[Instruction], payer: &Pubkey) -> Vec<&dyn Signer> {
        let mut selected: Vec<&dyn Signer> = Vec::new();
        let mut seen = Vec::new();

        let referenced = std::iter::once(payer).chain(
            instructions
                .iter()
                .flat_map(|ix| ix.accounts.iter())
                .filter(|meta| meta.is_signer)
                .map(|meta| &meta.pubkey),
        );

        for pubkey in referenced {
            if seen.contains(pubkey) {
                continue;
            }
            seen.push(*pubkey);
            if let Some(keypair) = self.keypairs.get(pubkey) {
                selected.push(keypair.as_ref());
            }
        }

        selected
    }
}

/// Signs and submits instruction lists in size-bounded transactions
pub struct Batcher<'a> {
    transport: &'a dyn Transport,
    payer: Pubkey,
}

impl<'a> Batcher<'a> {
    pub fn new(transport: &'a dyn Transport, payer: Pubkey) -> Self {
        Self { transport, payer }
    }

    /// Submit every instruction, in order, stopping at the first failure
    ///
    /// Batches already submitted stay submitted.
    pub async fn send(
        &self,
        instructions: &[Instruction],
        signers: &SignerSet,
    ) -> Result<Vec<Signature>, TransportError> {
        let mut signatures = Vec::new();
        let mut remaining = instructions;

        while !remaining.is_empty() {
            let (batch, rest) = remaining.split_at(next_batch_len(remaining, &self.payer));
            signatures.push(self.send_batch(batch, signers).await?);
            remaining = rest;
        }

        Ok(signatures)
    }

    async fn send_batch(
        &self,
        batch: &[Instruction],
        signers: &SignerSet,
    ) -> Result<Signature, TransportError> {
        let blockhash = self.transport.latest_blockhash().await?;
        let mut transaction = Transaction::new_unsigned(Message::new(batch, Some(&self.payer)));
        let keypairs = signers.select(batch, &self.payer);
        transaction.try_partial_sign(&keypairs, blockhash)?;

        log::debug!(
            "Sending transaction with {} instructions, {} signers",
            batch.len(),
            keypairs.len()
        );

        let signature = self.transport.submit(&transaction).await?;
        log::info!("Transaction {} confirmed", signature);
        Ok(signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oracle_layout::instruction;
    use proptest::prelude::*;
    use solana_sdk::instruction::AccountMeta;

    fn arb_instruction(pool: Vec<Pubkey>) -> impl Strategy<Value = Instruction> {
        (
            0..pool.len(),
            proptest::collection::vec((0..pool.len(), any::<bool>(), any::<bool>()), 0..4),
            proptest::collection::vec(any::<u8>(), 0..96),
        )
            .prop_map(move |(program, metas, data)| Instruction {
                program_id: pool[program],
                accounts: metas
                    .into_iter()
                    .map(|(i, is_signer, is_writable)| AccountMeta {
                        pubkey: pool[i],
                        is_signer,
                        is_writable,
                    })
                    .collect(),
                data,
            })
    }

    #[test]
    fn test_small_plan_is_one_batch() {
        let program_id = Pubkey::new_unique();
        let payer = Pubkey::new_unique();
        let price = Pubkey::new_unique();
        let instructions = vec![
            instruction::set_min_publishers(&program_id, &payer, &price, 3),
            instruction::toggle_publisher(&program_id, &payer, &price, &Pubkey::new_unique(), true),
        ];

        assert_eq!(split_batches(&instructions, &payer).len(), 1);
        assert!(transaction_size(&instructions, &payer) < BATCH_SIZE_LIMIT);
    }

    #[test]
    fn test_many_publishers_split() {
        let program_id = Pubkey::new_unique();
        let payer = Pubkey::new_unique();
        let price = Pubkey::new_unique();
        let instructions: Vec<Instruction> = (0..40)
            .map(|_| {
                instruction::toggle_publisher(&program_id, &payer, &price, &Pubkey::new_unique(), true)
            })
            .collect();

        let batches = split_batches(&instructions, &payer);
        assert!(batches.len() > 1);
        for batch in &batches {
            assert!(transaction_size(batch, &payer) < PACKET_DATA_SIZE);
        }
        assert_eq!(batches.concat(), instructions);
    }

    #[test]
    fn test_select_only_referenced_signers() {
        let payer = Arc::new(Keypair::new());
        let price = Arc::new(Keypair::new());
        let unrelated = Arc::new(Keypair::new());

        let mut signers = SignerSet::new();
        for keypair in [&payer, &price, &unrelated] {
            signers.insert(keypair.clone());
        }

        let ix = instruction::set_min_publishers(
            &Pubkey::new_unique(),
            &payer.pubkey(),
            &price.pubkey(),
            1,
        );
        let selected: Vec<Pubkey> = signers
            .select(&[ix], &payer.pubkey())
            .iter()
            .map(|s| s.pubkey())
            .collect();

        assert_eq!(selected, vec![payer.pubkey(), price.pubkey()]);
    }

    proptest! {
        #[test]
        fn prop_batches_bounded_and_complete(
            instructions in proptest::collection::vec(
                arb_instruction((0..12).map(|_| Pubkey::new_unique()).collect()),
                0..40,
            )
        ) {
            let payer = Pubkey::new_unique();
            let batches = split_batches(&instructions, &payer);

            for batch in &batches {
                prop_assert!(!batch.is_empty());
                prop_assert!(transaction_size(batch, &payer) < PACKET_DATA_SIZE);
            }
            prop_assert_eq!(batches.concat(), instructions);
        }
    }
}
