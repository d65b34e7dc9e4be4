//! One-off administrative commands

use crate::batcher::{Batcher, SignerSet};
use crate::error::{Result, SyncError};
use crate::keys::{self, KeyStore};
use crate::reference::{ReferenceProduct, ReferencePublishers};
use crate::rpc::Transport;
use crate::state::ProgramAccounts;
use oracle_layout::instruction;
use solana_sdk::{
    instruction::Instruction,
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

pub struct Admin<'a> {
    transport: &'a dyn Transport,
    keys: &'a KeyStore,
    program_id: Pubkey,
}

impl<'a> Admin<'a> {
    pub fn new(transport: &'a dyn Transport, keys: &'a KeyStore, program_id: Pubkey) -> Self {
        Self {
            transport,
            keys,
            program_id,
        }
    }

    async fn fetch(&self) -> Result<ProgramAccounts> {
        let accounts = self
            .transport
            .fetch_program_accounts(&self.program_id)
            .await?;
        Ok(ProgramAccounts::from_accounts(accounts))
    }

    /// Render the mapping chain head to tail with products, prices and publishers
    pub async fn list_accounts(&self, publishers: &ReferencePublishers) -> Result<String> {
        let accounts = self.fetch().await?;
        let chain = accounts.mapping_chain()?;
        if chain.is_empty() {
            return Err(SyncError::EmptyChain);
        }

        let mut out = String::new();
        for mapping_key in &chain {
            let Some(mapping) = accounts.mappings.get(mapping_key) else {
                continue;
            };
            out.push_str(&format!("Mapping: {}\n", mapping_key));

            for product_key in &mapping.product_keys {
                let Some(product) = accounts.products.get(product_key) else {
                    out.push_str(&format!("  Product: ??? ({})\n", product_key));
                    continue;
                };
                out.push_str(&format!(
                    "  Product: {}\n",
                    product.symbol().unwrap_or("???")
                ));

                if product.first_price_key == Pubkey::default() {
                    continue;
                }
                let Some(price) = accounts.prices.get(&product.first_price_key) else {
                    continue;
                };
                out.push_str(&format!(
                    "    Price: {} exponent ({} components)\n",
                    price.exponent, price.components_count
                ));
                for publisher in price.publisher_keys() {
                    out.push_str(&format!("      Publisher: {}\n", publishers.name_of(publisher)));
                }
            }
        }

        Ok(out)
    }

    /// Recreate `mapping_N`, `product_SYM` and `price_SYM` links from chain state
    ///
    /// Products are matched to jump symbols through their `symbol` attribute.
    /// Returns the number of links created.
    pub async fn restore_links(
        &self,
        products: &BTreeMap<String, ReferenceProduct>,
    ) -> Result<usize> {
        let jump_symbols: HashMap<&str, &str> = products
            .values()
            .filter_map(|product| {
                product
                    .metadata_value("symbol")
                    .map(|symbol| (symbol, product.jump_symbol.as_str()))
            })
            .collect();

        let accounts = self.fetch().await?;
        let chain = accounts.mapping_chain()?;
        if chain.is_empty() {
            return Err(SyncError::EmptyChain);
        }

        let mut created = 0;
        for (index, mapping_key) in chain.iter().enumerate() {
            created += self.restore(mapping_key, &keys::mapping_label(index))?;

            let Some(mapping) = accounts.mappings.get(mapping_key) else {
                continue;
            };
            for product_key in &mapping.product_keys {
                let Some(product) = accounts.products.get(product_key) else {
                    continue;
                };
                let Some(jump_symbol) = product.symbol().and_then(|s| jump_symbols.get(s)) else {
                    log::warn!("Product {} has no reference entry", product_key);
                    continue;
                };

                created += self.restore(product_key, &keys::product_label(jump_symbol))?;
                // only the first price account is linked
                if product.first_price_key != Pubkey::default() {
                    created +=
                        self.restore(&product.first_price_key, &keys::price_label(jump_symbol))?;
                }
            }
        }

        log::info!("Restored {} key links", created);
        Ok(created)
    }

    fn restore(&self, pubkey: &Pubkey, label: &str) -> Result<usize> {
        Ok(usize::from(self.keys.restore_link(pubkey, label)?))
    }

    pub async fn delete_price(&self, product: &Pubkey, price: &Pubkey) -> Result<Vec<Signature>> {
        let funding = self.funding()?;
        log::info!("Deleting price account {} from {}", price, product);
        let ix = instruction::delete_price(&self.program_id, &funding.pubkey(), product, price);
        self.send(funding, &[*product, *price], ix).await
    }

    pub async fn delete_product(
        &self,
        mapping: &Pubkey,
        product: &Pubkey,
    ) -> Result<Vec<Signature>> {
        let funding = self.funding()?;
        log::info!("Deleting product account {} from {}", product, mapping);
        let ix = instruction::delete_product(&self.program_id, &funding.pubkey(), mapping, product);
        self.send(funding, &[*mapping, *product], ix).await
    }

    pub async fn set_minimum_publishers(
        &self,
        price: &Pubkey,
        min_publishers: u8,
    ) -> Result<Vec<Signature>> {
        let funding = self.funding()?;
        log::info!("Setting minimum publishers of {} to {}", price, min_publishers);
        let ix = instruction::set_min_publishers(
            &self.program_id,
            &funding.pubkey(),
            price,
            min_publishers,
        );
        self.send(funding, &[*price], ix).await
    }

    /// Migrate a price account to v2, signed by the security authority on chain
    pub async fn resize_price_account(&self, price: &Pubkey) -> Result<Vec<Signature>> {
        let accounts = self.fetch().await?;
        if !accounts.prices.contains_key(price) {
            return Err(SyncError::MissingAccount(*price));
        }
        let security_authority = accounts
            .permission(&self.program_id)
            .map(|permission| permission.security_authority)
            .ok_or_else(|| SyncError::MissingKeypair("security authority".to_string()))?;

        let funding = self.funding()?;
        log::info!("Resizing price account {}", price);
        let ix = instruction::resize_price_account(&self.program_id, &security_authority, price);
        self.send(funding, &[security_authority], ix).await
    }

    fn funding(&self) -> Result<Arc<Keypair>> {
        Ok(Arc::new(self.keys.load_existing(keys::FUNDING_LABEL)?))
    }

    async fn send(
        &self,
        funding: Arc<Keypair>,
        account_signers: &[Pubkey],
        ix: Instruction,
    ) -> Result<Vec<Signature>> {
        let batcher = Batcher::new(self.transport, funding.pubkey());
        let mut signers = SignerSet::new();
        signers.insert(funding);
        for pubkey in account_signers {
            if !signers.contains(pubkey) {
                signers.insert(Arc::new(self.keys.load_pubkey(pubkey)?));
            }
        }

        Ok(batcher.send(&[ix], &signers).await?)
    }
}
