//! Asset registry
//!
//! Answers "is asset X known?" and "is asset X tradeable?". Assets are
//! reference data defined outside this core; the registry never mutates.

use crate::{
    config::AssetConfig,
    types::{Asset, AssetClass},
    Error, Result,
};
use std::collections::HashMap;

/// Read-only asset lookup
pub trait AssetRegistry: Send + Sync {
    /// Whether the asset exists at all (deposits allowed for any known
    /// asset)
    fn is_known(&self, asset: &Asset) -> bool;

    /// Whether orders may be placed on the asset
    fn is_tradeable(&self, asset: &Asset) -> bool;

    /// Asset class, `None` for unknown assets
    fn class_of(&self, asset: &Asset) -> Option<AssetClass>;

    /// The venue currency (the asset buy orders reserve)
    fn currency(&self) -> &Asset;

    /// The native chain coin (pays token transmission costs)
    fn native_coin(&self) -> &Asset;
}

#[derive(Debug)]
struct AssetInfo {
    class: AssetClass,
    tradeable: bool,
}

/// Config-backed registry
#[derive(Debug)]
pub struct StaticRegistry {
    assets: HashMap<Asset, AssetInfo>,
    currency: Asset,
    native_coin: Asset,
}

impl StaticRegistry {
    /// Build from the configured asset table
    ///
    /// The currency and native coin must both appear in the table, and the
    /// native coin must be of the native class.
    pub fn from_config(assets: &[AssetConfig], currency: &str, native_coin: &str) -> Result<Self> {
        let mut table = HashMap::new();
        for entry in assets {
            table.insert(
                Asset::new(entry.symbol.clone()),
                AssetInfo {
                    class: entry.class,
                    tradeable: entry.tradeable,
                },
            );
        }

        let currency = Asset::new(currency);
        let native_coin = Asset::new(native_coin);

        if !table.contains_key(&currency) {
            return Err(Error::Config(format!(
                "currency {} is not in the asset table",
                currency
            )));
        }
        match table.get(&native_coin) {
            None => {
                return Err(Error::Config(format!(
                    "native coin {} is not in the asset table",
                    native_coin
                )))
            }
            Some(info) if info.class != AssetClass::NativeCoin => {
                return Err(Error::Config(format!(
                    "native coin {} is not configured as native class",
                    native_coin
                )))
            }
            Some(_) => {}
        }

        Ok(Self {
            assets: table,
            currency,
            native_coin,
        })
    }
}

impl AssetRegistry for StaticRegistry {
    fn is_known(&self, asset: &Asset) -> bool {
        self.assets.contains_key(asset)
    }

    fn is_tradeable(&self, asset: &Asset) -> bool {
        self.assets.get(asset).map(|a| a.tradeable).unwrap_or(false)
    }

    fn class_of(&self, asset: &Asset) -> Option<AssetClass> {
        self.assets.get(asset).map(|a| a.class)
    }

    fn currency(&self) -> &Asset {
        &self.currency
    }

    fn native_coin(&self) -> &Asset {
        &self.native_coin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Vec<AssetConfig> {
        vec![
            AssetConfig {
                symbol: "XNC".to_string(),
                class: AssetClass::NativeCoin,
                tradeable: true,
            },
            AssetConfig {
                symbol: "BTC".to_string(),
                class: AssetClass::ForeignCoin,
                tradeable: true,
            },
            AssetConfig {
                symbol: "VUSD".to_string(),
                class: AssetClass::Token,
                tradeable: false,
            },
            AssetConfig {
                symbol: "VGLD".to_string(),
                class: AssetClass::Token,
                tradeable: true,
            },
        ]
    }

    #[test]
    fn test_lookup() {
        let registry = StaticRegistry::from_config(&table(), "VUSD", "XNC").unwrap();

        assert!(registry.is_known(&Asset::new("BTC")));
        assert!(registry.is_tradeable(&Asset::new("BTC")));
        // Currency is known but not tradeable
        assert!(registry.is_known(&Asset::new("VUSD")));
        assert!(!registry.is_tradeable(&Asset::new("VUSD")));
        // Unknown asset
        assert!(!registry.is_known(&Asset::new("DOGE")));
        assert!(!registry.is_tradeable(&Asset::new("DOGE")));

        assert_eq!(registry.class_of(&Asset::new("VGLD")), Some(AssetClass::Token));
        assert_eq!(registry.class_of(&Asset::new("DOGE")), None);
    }

    #[test]
    fn test_currency_must_be_known() {
        let err = StaticRegistry::from_config(&table(), "EUR", "XNC").unwrap_err();
        assert_eq!(err.code(), "CONFIG");
    }

    #[test]
    fn test_native_coin_must_be_native_class() {
        let err = StaticRegistry::from_config(&table(), "VUSD", "BTC").unwrap_err();
        assert_eq!(err.code(), "CONFIG");
    }
}
