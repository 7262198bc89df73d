//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the orchestrator.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::blockchain::types::Network;
use crate::resilience::{BackoffPolicy, RetryPolicy};

/// Root configuration for the staking orchestrator.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Network every workflow runs against.
    pub network: Network,

    /// Node RPC settings.
    pub rpc: RpcConfig,

    /// Retry budgets for broadcast, confirmation, and balance polling.
    pub retries: RetryConfig,

    /// Fee estimation settings.
    pub fees: FeeConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Node RPC configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct RpcConfig {
    /// Node base URL (e.g., "http://localhost:9650").
    pub url: String,

    /// Failover node base URLs.
    pub failover_urls: Vec<String>,

    /// RPC request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9650".to_string(),
            failover_urls: Vec::new(),
            timeout_secs: 10,
        }
    }
}

/// Retry configuration.
///
/// Each budget counts attempts, including the first one.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryConfig {
    /// Status polls before a confirmation times out.
    pub status_check_max_retries: u32,

    /// Broadcast attempts while the node is unreachable.
    pub broadcast_max_retries: u32,

    /// Polls of the P-Chain balance before a delegation.
    pub balance_check_max_retries: u32,

    /// Polls of the atomic UTXO queues during recovery.
    pub atomic_utxo_max_retries: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Fixed interval between atomic UTXO and balance polls in milliseconds.
    pub constant_interval_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            status_check_max_retries: 8,
            broadcast_max_retries: 7,
            balance_check_max_retries: 10,
            atomic_utxo_max_retries: 10,
            base_delay_ms: 1_000,
            max_delay_ms: 128_000,
            constant_interval_ms: 2_000,
        }
    }
}

impl RetryConfig {
    fn exponential(&self) -> BackoffPolicy {
        BackoffPolicy::Exponential {
            base: Duration::from_millis(self.base_delay_ms),
            max: Duration::from_millis(self.max_delay_ms),
        }
    }

    pub fn status_check_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.status_check_max_retries, self.exponential())
    }

    pub fn broadcast_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.broadcast_max_retries, self.exponential())
    }

    fn constant(&self) -> BackoffPolicy {
        BackoffPolicy::Constant(Duration::from_millis(self.constant_interval_ms))
    }

    pub fn balance_check_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.balance_check_max_retries, self.constant())
    }

    pub fn atomic_utxo_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.atomic_utxo_max_retries, self.constant())
    }
}

/// Fee estimation configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct FeeConfig {
    /// Multiplier applied to P-Chain static fees (1.0 = as published).
    pub p_fee_multiplier: f64,

    /// Multiplier applied to the C-Chain base fee (1.2 = 20% buffer).
    pub c_base_fee_multiplier: f64,

    /// Gas consumed by a C-Chain export.
    pub export_c_gas: u64,

    /// Gas consumed by a C-Chain import.
    pub import_c_gas: u64,

    /// P-Chain import fee in nano units.
    pub import_p_fee: u64,

    /// P-Chain export fee in nano units.
    pub export_p_fee: u64,

    /// P-Chain delegation fee in nano units.
    pub delegate_fee: u64,

    /// Re-read the base fee before broadcasting a C-Chain export.
    pub refetch_before_broadcast: bool,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            p_fee_multiplier: 1.0,
            c_base_fee_multiplier: 1.2,
            export_c_gas: 11_230,
            import_c_gas: 12_300,
            import_p_fee: 1_000_000,
            export_p_fee: 1_000_000,
            delegate_fee: 0,
            refetch_before_broadcast: true,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
