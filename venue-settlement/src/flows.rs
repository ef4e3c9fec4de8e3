//! Per-class settlement flows
//!
//! The three asset classes share one deposit/withdraw state machine and
//! differ only in two places: which ledger debits a withdrawal needs, and
//! whether deposits deduplicate per symbol or per class. Both differences
//! are captured here as data instead of per-asset code paths.

use crate::config::SettlementConfig;
use rust_decimal::Decimal;
use venue_ledger::{Asset, AssetClass, AssetRegistry};

/// Ledger debits one withdrawal must consume
///
/// Coins leave on their own chain transaction, so the debit is just the
/// amount. Tokens travel attached to a native-coin transaction, so the
/// account additionally pays the native carry cost.
pub fn withdrawal_debits(
    class: AssetClass,
    asset: &Asset,
    amount: Decimal,
    registry: &dyn AssetRegistry,
    config: &SettlementConfig,
) -> Vec<(Asset, Decimal)> {
    match class {
        AssetClass::NativeCoin | AssetClass::ForeignCoin => vec![(asset.clone(), amount)],
        AssetClass::Token => vec![
            (registry.native_coin().clone(), config.token_carry_cost()),
            (asset.clone(), amount),
        ],
    }
}

/// Whether deposits of this class deduplicate per symbol or per class
///
/// Token deposit rows are keyed by the carrying transaction, which can
/// name any token, so they share one dedup bucket per class. Coins are
/// keyed per symbol.
pub fn dedup_asset(class: AssetClass, asset: &Asset) -> Option<Asset> {
    match class {
        AssetClass::Token => None,
        AssetClass::NativeCoin | AssetClass::ForeignCoin => Some(asset.clone()),
    }
}
