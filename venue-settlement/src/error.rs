//! Error types for the settlement engine

use thiserror::Error;

/// Result type for settlement operations
pub type Result<T> = std::result::Result<T, Error>;

/// Settlement errors
#[derive(Error, Debug)]
pub enum Error {
    /// Ledger error
    #[error(transparent)]
    Ledger(#[from] venue_ledger::Error),

    /// External transaction id is empty or malformed
    #[error("Invalid transaction id ({0})")]
    InvalidTxId(String),

    /// Blockchain gateway error
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Stable machine-readable code for the HTTP layer
    pub fn code(&self) -> &'static str {
        match self {
            Error::Ledger(inner) => inner.code(),
            Error::InvalidTxId(_) => "INVALID_TXID",
            Error::Gateway(_) => "GATEWAY",
            Error::Config(_) => "CONFIG",
            Error::Io(_) => "IO",
        }
    }
}
