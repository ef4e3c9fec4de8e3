//! Prometheus metrics
//!
//! Each `Metrics` owns its registry, so multiple instances can coexist in
//! one process (tests, embedded deployments).

use crate::error::{Error, Result};
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, Opts, Registry, TextEncoder};

/// Metrics for ledger and settlement operations
pub struct Metrics {
    registry: Registry,

    /// Orders opened
    pub orders_placed: IntCounter,

    /// Orders cancelled
    pub orders_cancelled: IntCounter,

    /// Deposit intents recorded
    pub deposits_recorded: IntCounter,

    /// Withdrawals debited
    pub withdrawals_recorded: IntCounter,

    /// Vault rows moved to a terminal status
    pub vault_resolutions: IntCounter,

    /// Operations rejected by validation or state rules
    pub operations_rejected: IntCounter,

    /// End-to-end operation latency (seconds)
    pub operation_duration: Histogram,
}

impl Metrics {
    /// Create metrics with a fresh registry
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let orders_placed = IntCounter::with_opts(Opts::new(
            "ledger_orders_placed_total",
            "Total orders opened",
        ))
        .map_err(|e| Error::Config(format!("Failed to create metric: {}", e)))?;

        let orders_cancelled = IntCounter::with_opts(Opts::new(
            "ledger_orders_cancelled_total",
            "Total orders cancelled",
        ))
        .map_err(|e| Error::Config(format!("Failed to create metric: {}", e)))?;

        let deposits_recorded = IntCounter::with_opts(Opts::new(
            "ledger_deposits_total",
            "Total deposit intents recorded",
        ))
        .map_err(|e| Error::Config(format!("Failed to create metric: {}", e)))?;

        let withdrawals_recorded = IntCounter::with_opts(Opts::new(
            "ledger_withdrawals_total",
            "Total withdrawals debited",
        ))
        .map_err(|e| Error::Config(format!("Failed to create metric: {}", e)))?;

        let vault_resolutions = IntCounter::with_opts(Opts::new(
            "ledger_vault_resolutions_total",
            "Total vault rows moved to a terminal status",
        ))
        .map_err(|e| Error::Config(format!("Failed to create metric: {}", e)))?;

        let operations_rejected = IntCounter::with_opts(Opts::new(
            "ledger_operations_rejected_total",
            "Total operations rejected by validation or state rules",
        ))
        .map_err(|e| Error::Config(format!("Failed to create metric: {}", e)))?;

        let operation_duration = Histogram::with_opts(
            HistogramOpts::new(
                "ledger_operation_duration_seconds",
                "End-to-end operation latency",
            )
            .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        )
        .map_err(|e| Error::Config(format!("Failed to create metric: {}", e)))?;

        for collector in [
            Box::new(orders_placed.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(orders_cancelled.clone()),
            Box::new(deposits_recorded.clone()),
            Box::new(withdrawals_recorded.clone()),
            Box::new(vault_resolutions.clone()),
            Box::new(operations_rejected.clone()),
            Box::new(operation_duration.clone()),
        ] {
            registry
                .register(collector)
                .map_err(|e| Error::Config(format!("Failed to register metric: {}", e)))?;
        }

        Ok(Self {
            registry,
            orders_placed,
            orders_cancelled,
            deposits_recorded,
            withdrawals_recorded,
            vault_resolutions,
            operations_rejected,
            operation_duration,
        })
    }

    /// Render the registry in Prometheus text format
    pub fn export(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| Error::Config(format!("Failed to encode metrics: {}", e)))?;
        String::from_utf8(buffer).map_err(|e| Error::Config(format!("Metrics not UTF-8: {}", e)))
    }
}
