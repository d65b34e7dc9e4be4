//! Oracle account administration
//!
//! Keeps the oracle program's mapping, product, price and permission accounts
//! in line with a set of reference JSON files.
//!
//! A sync fetches every program account, decodes it with `oracle-layout`, and
//! plans four phases against that snapshot: authority permissions, the
//! mapping chain, per-symbol product and price accounts, and per-symbol
//! publishers. Each phase is batched into size-bounded transactions and
//! submitted before the next one is planned.

pub mod batcher;
pub mod commands;
pub mod config;
pub mod error;
pub mod keys;
pub mod mapping;
pub mod plan;
pub mod reconcile;
pub mod reference;
pub mod rpc;
pub mod state;
pub mod sync;

pub use batcher::{Batcher, SignerSet, BATCH_SIZE_LIMIT, PACKET_DATA_SIZE};
pub use commands::Admin;
pub use config::{Config, Network};
pub use error::SyncError;
pub use keys::KeyStore;
pub use mapping::{order_mapping_chain, BrokenChainError};
pub use plan::{InstructionPlan, Operation, OperationKind, SymbolPlan};
pub use reconcile::{PlanKeys, Reconciler, RentSchedule, SymbolKeys};
pub use reference::{apply_overrides, Reference, ReferencePaths};
pub use rpc::{DumpTransport, KeyedAccount, RpcTransport, Transport, TransportError};
pub use state::ProgramAccounts;
pub use sync::{SyncReport, SyncState, Synchronizer};
