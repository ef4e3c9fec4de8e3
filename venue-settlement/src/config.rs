//! Configuration for the settlement engine

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Settlement configuration
///
/// Token withdrawals ride on a native-coin transaction, so the account
/// pays `send_amount + fee` of the native coin on top of the token
/// amount itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementConfig {
    /// Native coin carried by the token-bearing transaction
    pub send_amount: Decimal,

    /// Native coin network fee
    pub fee: Decimal,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            send_amount: Decimal::new(1, 3), // 0.001
            fee: Decimal::new(5, 4),         // 0.0005
        }
    }
}

impl SettlementConfig {
    /// Total native-coin cost of one token withdrawal
    pub fn token_carry_cost(&self) -> Decimal {
        self.send_amount + self.fee
    }

    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SettlementConfig = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }
}
