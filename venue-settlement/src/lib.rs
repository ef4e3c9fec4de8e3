//! Settlement engine
//!
//! Moves value across the venue boundary: deposits credit the ledger
//! after on-chain confirmation, withdrawals debit it up front and hand
//! the transmission to a blockchain gateway. Every external transaction
//! id is recorded once and replays are refused with the prior outcome.
//!
//! The three asset classes (native coin, foreign coin, token) share one
//! state machine; per-class differences are confined to the flow tables
//! in [`flows`].

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod config;
pub mod engine;
pub mod error;
pub mod flows;
pub mod gateway;

// Re-exports
pub use config::SettlementConfig;
pub use engine::SettlementEngine;
pub use error::{Error, Result};
pub use gateway::{BlockchainGateway, LogGateway};
