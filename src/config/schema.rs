//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the engine.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the confirmation engine.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    /// Primary ledger connection and signing settings.
    pub ledger: LedgerConfig,

    /// Transaction monitor settings.
    pub monitor: MonitorConfig,

    /// Contract call cache settings.
    pub cache: CacheConfig,

    /// Secondary verification networks.
    pub secondary: SecondaryConfig,

    /// Agreement store settings.
    pub store: StoreConfig,

    /// Admin API settings.
    pub admin: AdminConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Primary ledger configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// JSON-RPC endpoint URL.
    pub rpc_url: String,

    /// Failover JSON-RPC endpoint URLs, used for read calls only.
    pub failover_urls: Vec<String>,

    /// Chain ID (e.g., 1 for Ethereum mainnet, 31337 for local Anvil).
    pub chain_id: u64,

    /// Address of the rental registry contract.
    pub contract_address: String,

    /// Name of the environment variable holding the signing key.
    pub private_key_env: String,

    /// RPC request timeout in seconds.
    pub rpc_timeout_secs: u64,

    /// Gas limit used when estimation fails.
    pub default_gas_limit: u64,

    /// Gas price multiplier (1.0 = node price, 1.2 = 20% buffer).
    pub gas_price_multiplier: f64,

    /// Maximum gas price in gwei (protection against spikes).
    pub max_gas_price_gwei: u64,

    /// Interval of the background reachability probe in seconds (0 disables it).
    pub health_check_interval_secs: u64,

    /// Retry policy for read calls.
    pub retry: RetryConfig,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://localhost:8545".to_string(),
            failover_urls: Vec::new(),
            chain_id: 31337,
            contract_address: String::new(),
            private_key_env: "RENTAL_LEDGER_PRIVATE_KEY".to_string(),
            rpc_timeout_secs: 10,
            default_gas_limit: 300_000,
            gas_price_multiplier: 1.2,
            max_gas_price_gwei: 500,
            health_check_interval_secs: 30,
            retry: RetryConfig::default(),
        }
    }
}

/// Retry configuration for transient transport failures.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 2000,
        }
    }
}

/// Transaction monitor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Block depth after which a transaction is final.
    pub confirmation_threshold: u64,

    /// Delay between polls in milliseconds.
    pub polling_interval_ms: u64,

    /// Number of polls before a transaction times out.
    pub max_attempts: u32,

    /// How long terminal records stay queryable, in seconds.
    pub history_retention_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            confirmation_threshold: 12,
            polling_interval_ms: 5000,
            max_attempts: 60,
            history_retention_secs: 24 * 3600,
        }
    }
}

/// Contract call cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Entry time-to-live in seconds.
    pub ttl_secs: u64,

    /// Interval of the background eviction sweep in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 60,
            sweep_interval_secs: 30,
        }
    }
}

/// Secondary verification network configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SecondaryConfig {
    /// Explorer-style public chain API.
    pub explorer: Option<ExplorerConfig>,

    /// Permissioned ledger gateway.
    pub permissioned: Option<PermissionedConfig>,

    /// Treat a failed audit record as a failed verification.
    pub require_audit_record: bool,
}

/// Etherscan-compatible explorer API.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExplorerConfig {
    /// Base URL, e.g. "https://api.etherscan.io".
    pub base_url: String,

    /// API key sent as the `apikey` query parameter.
    #[serde(default)]
    pub api_key: String,

    /// Request timeout in seconds.
    #[serde(default = "default_secondary_timeout")]
    pub timeout_secs: u64,
}

/// Permissioned ledger REST gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PermissionedConfig {
    /// Gateway base URL.
    pub gateway_url: String,

    /// Channel the audit records are written to.
    pub channel: String,

    /// Bearer token for the gateway.
    #[serde(default)]
    pub auth_token: String,

    /// Request timeout in seconds.
    #[serde(default = "default_secondary_timeout")]
    pub timeout_secs: u64,
}

fn default_secondary_timeout() -> u64 {
    15
}

/// Agreement store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON snapshot file; `None` keeps the store in memory only.
    pub snapshot_path: Option<String>,

    /// Prefix for metadata record URIs.
    pub metadata_base_uri: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            snapshot_path: None,
            metadata_base_uri: "urn:rental-metadata:".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Admin API bind address.
    pub bind_address: String,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Request timeout in seconds. Confirmations are awaited inline.
    pub request_timeout_secs: u64,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8081".to_string(),
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            request_timeout_secs: 900,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log format: "pretty" or "json".
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
