//! Venue market event bus
//!
//! In-process pub/sub used to decouple the accounting core from the
//! order-matching component. The core publishes advisory events (for
//! example "asset X has new or removed liquidity"); the matcher consumes
//! them on its own schedule.
//!
//! Delivery is fire-and-forget: a missed or duplicated event only delays a
//! matching pass, it never corrupts accounting state. Publishing when no
//! subscriber is attached is not an error.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod bus;
pub mod error;
pub mod message;

// Re-exports
pub use bus::{EventBus, Publisher, Subscriber};
pub use error::{Error, Result};
pub use message::{MarketEvent, MarketEventKind};
