//! Sync orchestration
//!
//! Runs the four reconciliation phases in order, submitting each phase before
//! planning the next. A refetch separates mapping from products and products
//! from publishers, but only when the earlier phase changed something.

use crate::batcher::{Batcher, SignerSet};
use crate::error::{Result, SyncError};
use crate::keys::{self, KeyStore};
use crate::plan::{instructions, Operation, SymbolPlan};
use crate::reconcile::{PlanKeys, Reconciler, RentSchedule, SymbolKeys};
use crate::reference::Reference;
use crate::rpc::Transport;
use crate::state::ProgramAccounts;
use futures::future::join_all;
use oracle_layout::PriceAccountVersion;
use solana_sdk::{pubkey::Pubkey, signature::Signer};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Init,
    AuthoritySynced,
    MappingSynced,
    ProductsSynced,
    PublishersSynced,
    Done,
}

/// Operations submitted per phase
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub authority_operations: usize,
    pub mapping_operations: usize,
    pub product_operations: usize,
    pub publisher_operations: usize,
    pub transactions: usize,
    pub refetches: usize,
}

impl SyncReport {
    pub fn total_operations(&self) -> usize {
        self.authority_operations
            + self.mapping_operations
            + self.product_operations
            + self.publisher_operations
    }
}

pub struct Synchronizer<'a> {
    transport: &'a dyn Transport,
    keys: &'a KeyStore,
    program_id: Pubkey,
    price_version: PriceAccountVersion,
}

impl<'a> Synchronizer<'a> {
    pub fn new(
        transport: &'a dyn Transport,
        keys: &'a KeyStore,
        program_id: Pubkey,
        price_version: PriceAccountVersion,
    ) -> Self {
        Self {
            transport,
            keys,
            program_id,
            price_version,
        }
    }

    pub async fn fetch(&self) -> Result<ProgramAccounts> {
        let accounts = self
            .transport
            .fetch_program_accounts(&self.program_id)
            .await?;
        Ok(ProgramAccounts::from_accounts(accounts))
    }

    /// Bring the program accounts in line with `reference`
    pub async fn sync(&self, reference: &Reference) -> Result<SyncReport> {
        let funding = Arc::new(self.keys.load_existing(keys::FUNDING_LABEL)?);
        let batcher = Batcher::new(self.transport, funding.pubkey());
        let mut signers = SignerSet::new();
        let mut plan_keys = PlanKeys::new(funding.pubkey());
        signers.insert(funding);

        let mut report = SyncReport::default();
        let mut state = SyncState::Init;

        let mut accounts = self.fetch().await?;
        let rent = RentSchedule::fetch(self.transport, self.price_version).await?;

        if reference.authority_permissions.is_some() {
            let upgrade_authority = self.keys.load_existing(keys::UPGRADE_AUTHORITY_LABEL)?;
            plan_keys.upgrade_authority = Some(upgrade_authority.pubkey());
            signers.insert(Arc::new(upgrade_authority));
        }

        // Authority permissions
        let operations = self
            .reconciler(&accounts, reference, &plan_keys, rent)
            .plan_authority()?;
        report.authority_operations = operations.len();
        report.transactions += self.submit(&batcher, &operations, &signers).await?;
        state = self.advance(state, SyncState::AuthoritySynced);

        // Mapping
        if accounts.mapping_chain()?.is_empty() {
            let mapping = self.keys.load_label(&keys::mapping_label(0))?;
            plan_keys.new_mapping = Some(mapping.pubkey());
            signers.insert(Arc::new(mapping));
        }

        let operations = self
            .reconciler(&accounts, reference, &plan_keys, rent)
            .plan_mapping()?;
        report.mapping_operations = operations.len();
        if !operations.is_empty() {
            report.transactions += self.submit(&batcher, &operations, &signers).await?;
            accounts = self.fetch().await?;
            report.refetches += 1;
        }
        state = self.advance(state, SyncState::MappingSynced);

        // Products and prices
        for symbol in reference.symbols() {
            let product = self.keys.load_label(&keys::product_label(symbol))?;
            let price = self.keys.load_label(&keys::price_label(symbol))?;
            plan_keys.symbols.insert(
                symbol.to_string(),
                SymbolKeys {
                    product: product.pubkey(),
                    price: price.pubkey(),
                },
            );
            signers.insert(Arc::new(product));
            signers.insert(Arc::new(price));
        }

        let plans = self
            .reconciler(&accounts, reference, &plan_keys, rent)
            .plan_products()?;
        report.product_operations = count_operations(&plans);
        if report.product_operations > 0 {
            self.resolve_signers(plans.iter().flat_map(|plan| &plan.operations), &mut signers)?;
            report.transactions += self.submit_concurrently(&batcher, &plans, &signers).await?;
            accounts = self.fetch().await?;
            report.refetches += 1;
        }
        state = self.advance(state, SyncState::ProductsSynced);

        // Publishers
        let plans = self
            .reconciler(&accounts, reference, &plan_keys, rent)
            .plan_publishers()?;
        report.publisher_operations = count_operations(&plans);
        report.transactions += self.submit_concurrently(&batcher, &plans, &signers).await?;
        state = self.advance(state, SyncState::PublishersSynced);

        self.advance(state, SyncState::Done);
        log::info!(
            "Sync complete: {} operations in {} transactions",
            report.total_operations(),
            report.transactions
        );

        Ok(report)
    }

    fn reconciler<'r>(
        &self,
        accounts: &'r ProgramAccounts,
        reference: &'r Reference,
        keys: &'r PlanKeys,
        rent: RentSchedule,
    ) -> Reconciler<'r> {
        Reconciler {
            program_id: self.program_id,
            accounts,
            reference,
            keys,
            rent,
            price_version: self.price_version,
        }
    }

    fn advance(&self, from: SyncState, to: SyncState) -> SyncState {
        log::debug!("Sync state {:?} -> {:?}", from, to);
        to
    }

    /// Load keypairs for signers the plan references but the set lacks
    ///
    /// Only the tail mapping account is expected to be missing here.
    fn resolve_signers<'o>(
        &self,
        operations: impl Iterator<Item = &'o Operation>,
        signers: &mut SignerSet,
    ) -> Result<()> {
        for operation in operations {
            for pubkey in operation.signers() {
                if !signers.contains(pubkey) {
                    signers.insert(Arc::new(self.keys.load_pubkey(pubkey)?));
                }
            }
        }
        Ok(())
    }

    async fn submit(
        &self,
        batcher: &Batcher<'_>,
        operations: &[Operation],
        signers: &SignerSet,
    ) -> Result<usize> {
        if operations.is_empty() {
            return Ok(0);
        }
        let signatures = batcher.send(&instructions(operations), signers).await?;
        Ok(signatures.len())
    }

    /// Submit every symbol's plan at once and wait for all of them
    ///
    /// A failing symbol does not stop the others; the first failure is
    /// returned once every symbol has settled.
    async fn submit_concurrently(
        &self,
        batcher: &Batcher<'_>,
        plans: &[SymbolPlan],
        signers: &SignerSet,
    ) -> Result<usize> {
        let results = join_all(plans.iter().filter(|plan| !plan.is_empty()).map(
            |plan| async move {
                log::info!(
                    "Submitting {} operations for {}",
                    plan.operations.len(),
                    plan.symbol
                );
                batcher
                    .send(&plan.instructions(), signers)
                    .await
                    .map_err(|e| (plan.symbol.as_str(), e))
            },
        ))
        .await;

        let mut transactions = 0;
        let mut first_error = None;

        for result in results {
            match result {
                Ok(signatures) => transactions += signatures.len(),
                Err((symbol, e)) => {
                    log::error!("Failed to sync {}: {}", symbol, e);
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(SyncError::Transport(e)),
            None => Ok(transactions),
        }
    }
}

fn count_operations(plans: &[SymbolPlan]) -> usize {
    plans.iter().map(|plan| plan.operations.len()).sum()
}
