//! Venue ledger core
//!
//! Balance accounting and order lifecycle for a multi-asset trading
//! venue. Balances are held per (account, asset); open orders reserve
//! funds without moving them, and every usable amount is the net of
//! total minus locked. Mutations serialize through per-account actor
//! partitions over RocksDB.
//!
//! Deposits and withdrawals are recorded here as vault rows; the flow
//! logic that drives them lives in the settlement crate.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod actor;
pub mod config;
pub mod error;
pub mod market;
pub mod metrics;
pub mod registry;
pub mod storage;
pub mod types;

// Re-exports
pub use actor::{LedgerHandle, spawn_ledger_actors};
pub use config::Config;
pub use error::{Error, Result};
pub use market::Market;
pub use metrics::Metrics;
pub use registry::{AssetRegistry, StaticRegistry};
pub use storage::{DedupScope, Storage};
pub use types::{
    to_standard, AccountDetails, AccountId, Asset, AssetBalance, AssetClass, Balance, Order,
    OrderSide, TradeRecord, VaultMode, VaultStatus, VaultTransaction,
};
