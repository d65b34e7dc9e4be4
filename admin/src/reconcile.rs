//! Reconciliation engine
//!
//! Diffs one snapshot of program accounts against the reference model and
//! emits the operations that close the gap. Planning is synchronous and pure;
//! the orchestrator decides when to submit and when to refetch.
//!
//! | Phase | Emits |
//! |---|---|
//! | authority | update-permissions when the permission account differs |
//! | mapping | create + init when the chain is empty |
//! | products | per symbol: create/add product, create/add price, metadata update |
//! | publishers | per symbol: min-publishers, publisher removals, then additions |

use crate::error::{Result, SyncError};
use crate::plan::{InstructionPlan, Operation, OperationKind, SymbolPlan};
use crate::reference::Reference;
use crate::rpc::{Transport, TransportError};
use crate::state::ProgramAccounts;
use oracle_layout::{
    instruction, permissions_address, PermissionRecord, PriceAccountVersion, ProductRecord,
    MAPPING_ACCOUNT_SIZE, MAPPING_PRODUCT_LIMIT, PRODUCT_ACCOUNT_SIZE,
};
use solana_sdk::{pubkey::Pubkey, system_instruction};
use std::collections::{BTreeMap, BTreeSet};

/// Rent-exempt balances for the accounts a sync may create
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RentSchedule {
    pub mapping: u64,
    pub product: u64,
    pub price: u64,
}

impl RentSchedule {
    pub async fn fetch(
        transport: &dyn Transport,
        price_version: PriceAccountVersion,
    ) -> std::result::Result<Self, TransportError> {
        Ok(Self {
            mapping: transport
                .minimum_rent_exempt_balance(MAPPING_ACCOUNT_SIZE)
                .await?,
            product: transport
                .minimum_rent_exempt_balance(PRODUCT_ACCOUNT_SIZE)
                .await?,
            price: transport
                .minimum_rent_exempt_balance(price_version.size())
                .await?,
        })
    }
}

/// Product and price account keys derived for a symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolKeys {
    pub product: Pubkey,
    pub price: Pubkey,
}

/// Public keys the planner may reference
#[derive(Debug, Clone, Default)]
pub struct PlanKeys {
    pub funding: Pubkey,
    pub upgrade_authority: Option<Pubkey>,
    /// Key for the first mapping account, needed only while the chain is empty
    pub new_mapping: Option<Pubkey>,
    pub symbols: BTreeMap<String, SymbolKeys>,
}

impl PlanKeys {
    pub fn new(funding: Pubkey) -> Self {
        Self {
            funding,
            ..Self::default()
        }
    }
}

pub struct Reconciler<'a> {
    pub program_id: Pubkey,
    pub accounts: &'a ProgramAccounts,
    pub reference: &'a Reference,
    pub keys: &'a PlanKeys,
    pub rent: RentSchedule,
    pub price_version: PriceAccountVersion,
}

impl<'a> Reconciler<'a> {
    /// Plan every phase against the same snapshot
    pub fn plan(&self) -> Result<InstructionPlan> {
        Ok(InstructionPlan {
            authority: self.plan_authority()?,
            mapping: self.plan_mapping()?,
            products: self.plan_products()?,
            publishers: self.plan_publishers()?,
        })
    }

    pub fn plan_authority(&self) -> Result<Vec<Operation>> {
        let Some(target) = &self.reference.authority_permissions else {
            return Ok(Vec::new());
        };

        let wanted = PermissionRecord {
            master_authority: target.master_authority,
            data_curation_authority: target.data_curation_authority,
            security_authority: target.security_authority,
        };

        if self.accounts.permission(&self.program_id) == Some(&wanted) {
            return Ok(Vec::new());
        }

        let upgrade_authority = self
            .keys
            .upgrade_authority
            .ok_or_else(|| SyncError::MissingKeypair("upgrade_authority".to_string()))?;

        log::info!("Updating authority permissions");
        log::debug!("Building update_permissions instruction");

        Ok(vec![Operation::new(
            OperationKind::UpdatePermissions,
            permissions_address(&self.program_id),
            instruction::update_permissions(
                &self.program_id,
                &upgrade_authority,
                &wanted.master_authority,
                &wanted.data_curation_authority,
                &wanted.security_authority,
            ),
        )])
    }

    pub fn plan_mapping(&self) -> Result<Vec<Operation>> {
        if !self.accounts.mapping_chain()?.is_empty() {
            return Ok(Vec::new());
        }

        let mapping = self.new_mapping_key()?;
        log::info!("Creating new mapping account {}", mapping);

        Ok(vec![
            self.create_account(mapping, self.rent.mapping, MAPPING_ACCOUNT_SIZE),
            Operation::new(
                OperationKind::InitMapping,
                mapping,
                instruction::init_mapping(&self.program_id, &self.keys.funding, &mapping),
            ),
        ])
    }

    pub fn plan_products(&self) -> Result<Vec<SymbolPlan>> {
        let chain = self.accounts.mapping_chain()?;
        let tail = match chain.last() {
            Some(tail) => *tail,
            // the mapping phase has not been committed yet
            None => self.new_mapping_key()?,
        };

        // product slots left on the tail; a pending mapping starts empty
        let mut room = self
            .accounts
            .mappings
            .get(&tail)
            .map_or(MAPPING_PRODUCT_LIMIT, |record| {
                MAPPING_PRODUCT_LIMIT.saturating_sub(record.product_keys.len())
            });

        let mut plans = Vec::new();
        for symbol in self.reference.symbols() {
            let keys = self.symbol_keys(symbol)?;
            if !self.accounts.products.contains_key(&keys.product) {
                if room == 0 {
                    log::warn!(
                        "Tail mapping account {} is full, not adding product for {}",
                        tail,
                        symbol
                    );
                    plans.push(SymbolPlan::new(symbol));
                    continue;
                }
                room -= 1;
            }
            plans.push(self.plan_symbol_accounts(symbol, &tail)?);
        }

        Ok(plans)
    }

    fn plan_symbol_accounts(&self, symbol: &str, mapping: &Pubkey) -> Result<SymbolPlan> {
        let product = self.reference.product(symbol)?;
        let keys = self.symbol_keys(symbol)?;
        let funding = &self.keys.funding;
        let mut plan = SymbolPlan::new(symbol);

        let onchain_product = self.accounts.products.get(&keys.product);
        let onchain_price = self.accounts.prices.get(&keys.price);

        if onchain_product.is_none() {
            log::info!("Creating new product account for {}", symbol);
            plan.operations.push(self.create_account(
                keys.product,
                self.rent.product,
                PRODUCT_ACCOUNT_SIZE,
            ));
            log::debug!("Building add_product instruction");
            plan.operations.push(Operation::new(
                OperationKind::AddProduct,
                keys.product,
                instruction::add_product(&self.program_id, funding, mapping, &keys.product),
            ));
            plan.operations.push(self.update_product(&keys.product, &product.metadata)?);
        }

        if onchain_price.is_none() {
            log::info!("Creating new price account for {}", symbol);
            plan.operations.push(self.create_account(
                keys.price,
                self.rent.price,
                self.price_version.size(),
            ));
            log::debug!("Building add_price instruction");
            plan.operations.push(Operation::new(
                OperationKind::AddPrice {
                    exponent: product.exponent,
                },
                keys.price,
                instruction::add_price(
                    &self.program_id,
                    funding,
                    &keys.product,
                    &keys.price,
                    product.exponent,
                ),
            ));
        }

        if let (Some(onchain), Some(_)) = (onchain_product, onchain_price) {
            if metadata_differs(onchain, &product.metadata) {
                log::info!("Updating product account metadata for {}", symbol);
                plan.operations.push(self.update_product(&keys.product, &product.metadata)?);
            }
        }

        Ok(plan)
    }

    pub fn plan_publishers(&self) -> Result<Vec<SymbolPlan>> {
        self.reference
            .symbols()
            .map(|symbol| self.plan_symbol_publishers(symbol))
            .collect()
    }

    fn plan_symbol_publishers(&self, symbol: &str) -> Result<SymbolPlan> {
        let product = self.reference.product(symbol)?;
        let keys = self.symbol_keys(symbol)?;
        let mut plan = SymbolPlan::new(symbol);

        let Some(price) = self.accounts.prices.get(&keys.price) else {
            log::warn!(
                "Price account {} for {} not found, skipping publishers",
                keys.price,
                symbol
            );
            return Ok(plan);
        };

        if let Some(min_publishers) = product.min_publishers {
            if min_publishers != price.min_publishers {
                log::info!(
                    "Setting minimum publishers for {} to {} (was {})",
                    symbol,
                    min_publishers,
                    price.min_publishers
                );
                plan.operations.push(Operation::new(
                    OperationKind::SetMinPublishers { min_publishers },
                    keys.price,
                    instruction::set_min_publishers(
                        &self.program_id,
                        &self.keys.funding,
                        &keys.price,
                        min_publishers,
                    ),
                ));
            }
        }

        let wanted = self.reference.publisher_keys(symbol)?;
        let current: BTreeSet<Pubkey> = price.publisher_keys().copied().collect();

        for publisher in current.difference(&wanted) {
            log::info!(
                "Removing publisher {} from {}",
                self.reference.publishers.name_of(publisher),
                symbol
            );
            plan.operations
                .push(self.toggle_publisher(&keys.price, publisher, false));
        }

        for publisher in wanted.difference(&current) {
            log::info!(
                "Adding publisher {} to {}",
                self.reference.publishers.name_of(publisher),
                symbol
            );
            plan.operations
                .push(self.toggle_publisher(&keys.price, publisher, true));
        }

        Ok(plan)
    }

    fn symbol_keys(&self, symbol: &str) -> Result<SymbolKeys> {
        self.keys
            .symbols
            .get(symbol)
            .copied()
            .ok_or_else(|| SyncError::MissingKeypair(format!("product/price of {}", symbol)))
    }

    fn new_mapping_key(&self) -> Result<Pubkey> {
        self.keys
            .new_mapping
            .ok_or_else(|| SyncError::MissingKeypair("mapping_0".to_string()))
    }

    fn create_account(&self, account: Pubkey, lamports: u64, space: usize) -> Operation {
        log::debug!("Building create_account instruction ({} bytes)", space);
        Operation::new(
            OperationKind::CreateAccount { space },
            account,
            system_instruction::create_account(
                &self.keys.funding,
                &account,
                lamports,
                space as u64,
                &self.program_id,
            ),
        )
    }

    fn update_product(&self, product: &Pubkey, metadata: &[(String, String)]) -> Result<Operation> {
        log::debug!("Building update_product instruction");
        Ok(Operation::new(
            OperationKind::UpdateProduct,
            *product,
            instruction::update_product(&self.program_id, &self.keys.funding, product, metadata)?,
        ))
    }

    fn toggle_publisher(&self, price: &Pubkey, publisher: &Pubkey, enable: bool) -> Operation {
        let kind = if enable {
            OperationKind::AddPublisher {
                publisher: *publisher,
            }
        } else {
            OperationKind::RemovePublisher {
                publisher: *publisher,
            }
        };

        Operation::new(
            kind,
            *price,
            instruction::toggle_publisher(
                &self.program_id,
                &self.keys.funding,
                price,
                publisher,
                enable,
            ),
        )
    }
}

/// True if any reference attribute is missing or different on chain
///
/// Extra on-chain attributes are tolerated.
fn metadata_differs(onchain: &ProductRecord, reference: &[(String, String)]) -> bool {
    reference
        .iter()
        .any(|(key, value)| onchain.metadata_value(key) != Some(value.as_str()))
}
