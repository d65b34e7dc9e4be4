//! Mapping chain resolution
//!
//! Mapping accounts form a singly linked list through `next_mapping_key`. The
//! fetched accounts arrive in no particular order; this module recovers the
//! head-to-tail order new products are placed by (always on the tail).

use oracle_layout::MappingRecord;
use solana_sdk::pubkey::Pubkey;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokenChainError {
    #[error("no mapping account terminates the chain")]
    NoTail,

    #[error("{0} mapping accounts claim to be the tail")]
    MultipleTails(usize),

    #[error("only {placed} of {total} mapping accounts are reachable from the tail")]
    Disconnected { placed: usize, total: usize },
}

/// Order mapping accounts head to tail
///
/// Builds the reverse `next -> this` map, finds the single tail and walks
/// backwards from it. Every record must be placed; an empty input is an empty
/// chain.
pub fn order_mapping_chain(
    records: &HashMap<Pubkey, MappingRecord>,
) -> Result<Vec<Pubkey>, BrokenChainError> {
    if records.is_empty() {
        return Ok(Vec::new());
    }

    let tails: Vec<Pubkey> = records
        .iter()
        .filter(|(_, record)| record.is_tail())
        .map(|(key, _)| *key)
        .collect();

    let tail = match tails.as_slice() {
        [] => return Err(BrokenChainError::NoTail),
        [tail] => *tail,
        many => return Err(BrokenChainError::MultipleTails(many.len())),
    };

    let previous: HashMap<Pubkey, Pubkey> = records
        .iter()
        .filter(|(_, record)| !record.is_tail())
        .map(|(key, record)| (record.next_mapping_key, *key))
        .collect();

    let mut chain = vec![tail];
    let mut visited = HashSet::from([tail]);
    let mut current = tail;

    while let Some(prev) = previous.get(&current) {
        if !visited.insert(*prev) {
            break;
        }
        chain.push(*prev);
        current = *prev;
    }

    if chain.len() != records.len() {
        return Err(BrokenChainError::Disconnected {
            placed: chain.len(),
            total: records.len(),
        });
    }

    chain.reverse();
    Ok(chain)
}
