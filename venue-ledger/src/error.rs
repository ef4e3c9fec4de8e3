//! Error types for the ledger

use crate::types::{Asset, VaultStatus};
use thiserror::Error;
use uuid::Uuid;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
///
/// Validation errors are raised before any storage access. State errors
/// reflect the ledger's view at the moment the serialized operation ran.
/// Storage failures propagate unchanged; nothing here is retried.
#[derive(Error, Debug)]
pub enum Error {
    /// Account identifier is not a valid address
    #[error("Invalid account ({0})")]
    InvalidAccount(String),

    /// Numeric field is not a positive number
    #[error("Invalid number ({0})")]
    InvalidNumber(String),

    /// Asset is not known to the venue
    #[error("Invalid asset ({0})")]
    InvalidAsset(String),

    /// Asset is known but not open for trading
    #[error("Asset not tradeable ({0})")]
    AssetNotTradeable(String),

    /// Order type must be buy or sell
    #[error("Invalid order type ({0}), must be buy or sell")]
    InvalidOrderType(String),

    /// Total balance below the requested amount
    #[error("Insufficient {asset}")]
    InsufficientBalance {
        /// Asset that was checked
        asset: Asset,
    },

    /// Total balance covers the amount but open orders reserve too much of it
    #[error("Insufficient {asset} (some are locked in orders)")]
    BalanceLocked {
        /// Asset that was checked
        asset: Asset,
    },

    /// Order not found
    #[error("Order not found ({0})")]
    OrderNotFound(Uuid),

    /// Order belongs to another account
    #[error("Order does not belong to the current account")]
    NotOwner,

    /// External transaction id already recorded
    #[error("{}", duplicate_message(.0))]
    DuplicateEntry(VaultStatus),

    /// Vault transaction not found
    #[error("Vault transaction not found ({0})")]
    VaultNotFound(Uuid),

    /// Vault transaction already in a terminal status
    #[error("Vault transaction already finalized ({0})")]
    VaultFinalized(Uuid),

    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn duplicate_message(status: &VaultStatus) -> &'static str {
    match status {
        VaultStatus::Pending => "Transaction already in process",
        VaultStatus::Rejected => "Transaction already rejected",
        VaultStatus::Success => "Transaction already used to credit funds",
    }
}

impl Error {
    /// Stable machine-readable code for the HTTP layer
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidAccount(_) => "INVALID_ACCOUNT",
            Error::InvalidNumber(_) => "INVALID_NUMBER",
            Error::InvalidAsset(_) => "INVALID_ASSET",
            Error::AssetNotTradeable(_) => "ASSET_NOT_TRADEABLE",
            Error::InvalidOrderType(_) => "INVALID_ORDER_TYPE",
            Error::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            Error::BalanceLocked { .. } => "INSUFFICIENT_BALANCE_LOCKED",
            Error::OrderNotFound(_) => "ORDER_NOT_FOUND",
            Error::NotOwner => "NOT_OWNER",
            Error::DuplicateEntry(_) => "DUPLICATE_ENTRY",
            Error::VaultNotFound(_) => "VAULT_NOT_FOUND",
            Error::VaultFinalized(_) => "VAULT_FINALIZED",
            Error::Storage(_) => "STORAGE",
            Error::Serialization(_) => "SERIALIZATION",
            Error::Concurrency(_) => "CONCURRENCY",
            Error::Config(_) => "CONFIG",
            Error::Io(_) => "IO",
        }
    }
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}
