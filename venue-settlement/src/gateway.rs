//! Blockchain gateway seam
//!
//! Settlement hands confirmed withdrawal intents to a gateway and moves
//! on; transmission, retries, and reconciliation live on the other side
//! of this trait.

use async_trait::async_trait;
use rust_decimal::Decimal;
use venue_ledger::{AccountId, Asset};

/// One-way hand-off of withdrawal intents to the chain infrastructure
#[async_trait]
pub trait BlockchainGateway: Send + Sync {
    /// Start transmitting a withdrawal; must not block on confirmation
    async fn initiate_withdrawal(&self, account: &AccountId, asset: &Asset, amount: Decimal);
}

/// Gateway that only logs, for tests and local runs
#[derive(Debug, Default)]
pub struct LogGateway;

#[async_trait]
impl BlockchainGateway for LogGateway {
    async fn initiate_withdrawal(&self, account: &AccountId, asset: &Asset, amount: Decimal) {
        tracing::info!(
            account = %account,
            asset = %asset,
            amount = %amount,
            "Withdrawal handed to gateway"
        );
    }
}
