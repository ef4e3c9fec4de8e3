//! Error types for the event bus

use thiserror::Error;

/// Result type for bus operations
pub type Result<T> = std::result::Result<T, Error>;

/// Event bus errors
#[derive(Error, Debug)]
pub enum Error {
    /// Bus closed (all publishers dropped)
    #[error("Event bus closed")]
    Closed,

    /// Subscriber fell behind and missed events
    #[error("Subscriber lagged, {0} events skipped")]
    Lagged(u64),
}

impl From<tokio::sync::broadcast::error::RecvError> for Error {
    fn from(err: tokio::sync::broadcast::error::RecvError) -> Self {
        use tokio::sync::broadcast::error::RecvError;
        match err {
            RecvError::Closed => Error::Closed,
            RecvError::Lagged(n) => Error::Lagged(n),
        }
    }
}
