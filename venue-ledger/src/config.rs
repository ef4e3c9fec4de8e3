//! Configuration for the venue ledger

use crate::types::AssetClass;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// Venue currency symbol (reserved by buy orders)
    pub currency: String,

    /// Native chain coin symbol (pays token transmission costs)
    pub native_coin: String,

    /// Asset table
    pub assets: Vec<AssetConfig>,

    /// RocksDB configuration
    pub rocksdb: RocksDbConfig,

    /// Actor pool configuration
    pub actors: ActorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/venue"),
            service_name: "venue-ledger".to_string(),
            currency: "VUSD".to_string(),
            native_coin: "XNC".to_string(),
            assets: vec![
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
            ],
            rocksdb: RocksDbConfig::default(),
            actors: ActorConfig::default(),
        }
    }
}

/// One asset table entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetConfig {
    /// Asset symbol
    pub symbol: String,

    /// Asset class
    pub class: AssetClass,

    /// Whether orders may be placed on the asset
    pub tradeable: bool,
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocksDbConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 64,
            max_write_buffer_number: 4,
            max_background_jobs: 4,
        }
    }
}

/// Actor pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorConfig {
    /// Number of single-writer partitions (accounts hash onto these)
    pub partitions: usize,

    /// Mailbox depth per partition (bounded for backpressure)
    pub mailbox_capacity: usize,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            partitions: 8,
            mailbox_capacity: 1000,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("VENUE_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(currency) = std::env::var("VENUE_CURRENCY") {
            config.currency = currency;
        }

        if let Ok(partitions) = std::env::var("VENUE_ACTOR_PARTITIONS") {
            config.actors.partitions = partitions
                .parse()
                .map_err(|_| crate::Error::Config("VENUE_ACTOR_PARTITIONS must be a number".to_string()))?;
        }

        Ok(config)
    }
}
