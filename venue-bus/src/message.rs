//! Market event envelope

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Market event envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketEvent {
    /// Event ID (UUIDv7 for ordering)
    pub id: Uuid,

    /// Event kind
    pub kind: MarketEventKind,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl MarketEvent {
    /// Create new event
    pub fn new(kind: MarketEventKind) -> Self {
        Self {
            id: Uuid::now_v7(),
            kind,
            timestamp: Utc::now(),
        }
    }

    /// Create a matching-pass request for an asset
    pub fn match_requested(asset: impl Into<String>) -> Self {
        Self::new(MarketEventKind::MatchRequested {
            asset: asset.into(),
        })
    }

    /// Get subject for this event
    pub fn subject(&self) -> String {
        match &self.kind {
            MarketEventKind::MatchRequested { asset } => {
                format!("venue.market.match.{}", asset)
            }
        }
    }
}

/// Market event kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketEventKind {
    /// A matching pass may find new or freed liquidity on this asset
    MatchRequested {
        /// Asset symbol
        asset: String,
    },
}

impl MarketEventKind {
    /// Asset this event concerns
    pub fn asset(&self) -> &str {
        match self {
            MarketEventKind::MatchRequested { asset } => asset,
        }
    }
}
