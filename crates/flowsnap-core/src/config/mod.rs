//! Application configuration with layered loading.
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded in this order (later overrides earlier):
//!
//! 1. **Compiled defaults**: Hardcoded in struct `Default` implementations
//! 2. **Config file**: TOML file specified by `FLOWSNAP_CONFIG` env var
//! 3. **Environment variables**: `FLOWSNAP__*` env vars override specific fields
//!
//! # Configuration Sections
//!
//! - [`ServerConfig`]: HTTP server settings (bind address, port, timeout)
//! - [`ChainConfig`]: One entry per chain: RPC and ledger endpoints, tracked tokens
//! - [`VerifierSettings`]: Batch size, retry policy and the in-flight ceiling
//! - [`LedgerConfig`]: Ledger page size
//! - [`SchedulerConfig`]: Snapshot interval
//! - [`StorageConfig`]: Directory for durable snapshots
//! - [`LoggingConfig`]: Log level and format
//!
//! # Example
//!
//! ```toml
//! [server]
//! bind_port = 3040
//!
//! [[chains]]
//! chain_id = 137
//! name = "polygon"
//! rpc_url = "https://polygon-rpc.example.com"
//! ledger_url = "https://subgraph.example.com/polygon"
//! tokens = ["0x3aD736904E9e65189c3000c7DD2c8AC8bB7cD4e3"]
//!
//! [verifier]
//! batch_size = 100
//! max_in_flight = 200
//! ```

use alloy_primitives::Address;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, path::Path, str::FromStr, time::Duration};

use crate::{ledger::DEFAULT_PAGE_SIZE, rpc::RetryPolicy, rpc::VerifierConfig};

/// HTTP server configuration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// IP address to bind the server to. Defaults to `127.0.0.1`.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Port number to listen on. Must be greater than 0. Defaults to `3040`.
    #[serde(default = "default_bind_port")]
    pub bind_port: u16,

    /// Maximum number of concurrent read requests. Defaults to `256`.
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,

    /// Request timeout in seconds. Defaults to `30`.
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_bind_port() -> u16 {
    3040
}

fn default_max_concurrent_requests() -> usize {
    256
}

fn default_request_timeout_seconds() -> u64 {
    30
}

/// One chain and the tokens snapshotted on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    pub chain_id: u64,

    /// Human-readable name used in logs (e.g., "polygon").
    pub name: String,

    /// JSON-RPC endpoint for `eth_blockNumber` and `eth_call`.
    pub rpc_url: String,

    /// GraphQL endpoint of the streaming ledger.
    pub ledger_url: String,

    /// Token contract addresses, checksummed or lowercase.
    #[serde(default)]
    pub tokens: Vec<String>,

    /// Per-request timeout for both endpoints. Defaults to `30`.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_timeout_seconds() -> u64 {
    30
}

impl ChainConfig {
    /// Parses [`tokens`](Self::tokens) into addresses.
    ///
    /// # Errors
    ///
    /// Returns a descriptive error string naming the first invalid token.
    pub fn token_addresses(&self) -> Result<Vec<Address>, String> {
        self.tokens
            .iter()
            .map(|t| {
                Address::from_str(t)
                    .map_err(|e| format!("Invalid token address {t} on chain {}: {e}", self.name))
            })
            .collect()
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Verification batching and retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierSettings {
    /// Accounts per verification batch. Defaults to `100`.
    pub batch_size: usize,

    /// Attempts per balance read, including the first. Defaults to `3`.
    pub max_attempts: u32,

    /// Backoff before the second attempt. Defaults to `1000`.
    pub base_delay_ms: u64,

    /// Backoff growth factor. Defaults to `2.0`.
    pub backoff_multiplier: f64,

    /// Backoff cap. Defaults to `30000`.
    pub max_delay_ms: u64,

    /// Process-wide ceiling on concurrent balance reads. Defaults to `200`.
    pub max_in_flight: usize,

    /// Verify every account instead of trusting static ledger balances. Defaults to `false`.
    pub verify_all: bool,
}

/// Ledger pagination settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Records per page. Defaults to `1000`.
    pub page_size: usize,
}

/// Snapshot scheduling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Seconds between runs of one token. Defaults to `300`.
    pub interval_seconds: u64,

    /// Run every token once right after startup. Defaults to `true`.
    pub run_on_startup: bool,
}

/// Durable snapshot storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding one JSON file per snapshot. Defaults to `./data/snapshots`.
    pub data_dir: String,
}

/// Application logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (e.g., "trace", "debug", "info", "warn", "error"). Defaults to `"info"`.
    pub level: String,

    /// Output format: `"json"` or `"pretty"`. Defaults to `"pretty"`.
    pub format: String,
}

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub chains: Vec<ChainConfig>,

    #[serde(default)]
    pub verifier: VerifierSettings,

    #[serde(default)]
    pub ledger: LedgerConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            bind_port: default_bind_port(),
            max_concurrent_requests: default_max_concurrent_requests(),
            request_timeout_seconds: default_request_timeout_seconds(),
        }
    }
}

impl Default for VerifierSettings {
    fn default() -> Self {
        Self {
            batch_size: 100,
            max_attempts: 3,
            base_delay_ms: 1_000,
            backoff_multiplier: 2.0,
            max_delay_ms: 30_000,
            max_in_flight: 200,
            verify_all: false,
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self { page_size: DEFAULT_PAGE_SIZE }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { interval_seconds: 300, run_on_startup: true }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { data_dir: "./data/snapshots".to_string() }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "pretty".to_string() }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            chains: Vec::new(),
            verifier: VerifierSettings::default(),
            ledger: LedgerConfig::default(),
            scheduler: SchedulerConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl VerifierSettings {
    /// The single retry policy applied to every on-chain read.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            multiplier: self.backoff_multiplier,
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }

    #[must_use]
    pub fn verifier_config(&self) -> VerifierConfig {
        VerifierConfig { batch_size: self.batch_size, retry: self.retry_policy() }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file with environment variable overrides.
    ///
    /// Environment variables with the `FLOWSNAP__` prefix can override any configuration
    /// value. Use `__` as a separator for nested fields (e.g.,
    /// `FLOWSNAP__SCHEDULER__INTERVAL_SECONDS=60`).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, parsed, or deserialized.
    pub fn from_file<P: AsRef<Path>>(config_path: P) -> Result<Self, ConfigError> {
        let config_builder = Config::builder()
            .set_default("server.bind_address", "127.0.0.1")?
            .set_default("server.bind_port", 3040)?
            .set_default("server.max_concurrent_requests", 256)?
            .set_default("server.request_timeout_seconds", 30)?
            .set_default("verifier.batch_size", 100)?
            .set_default("verifier.max_attempts", 3)?
            .set_default("verifier.base_delay_ms", 1_000)?
            .set_default("verifier.backoff_multiplier", 2.0)?
            .set_default("verifier.max_delay_ms", 30_000)?
            .set_default("verifier.max_in_flight", 200)?
            .set_default("verifier.verify_all", false)?
            .set_default("ledger.page_size", 1_000)?
            .set_default("scheduler.interval_seconds", 300)?
            .set_default("scheduler.run_on_startup", true)?
            .set_default("storage.data_dir", "./data/snapshots")?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name(&config_path.as_ref().to_string_lossy()).required(false))
            .add_source(Environment::with_prefix("FLOWSNAP").separator("__"))
            .build()?;

        config_builder.try_deserialize()
    }

    /// Loads configuration from `config/config.toml` with fallback to defaults.
    ///
    /// The config file path can be overridden using the `FLOWSNAP_CONFIG` environment
    /// variable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration cannot be loaded or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("FLOWSNAP_CONFIG").unwrap_or_else(|_| "config/config.toml".to_string());
        Self::from_file(&config_path)
    }

    /// Returns the parsed socket address for the HTTP server.
    ///
    /// # Errors
    ///
    /// Returns an error string if the address cannot be parsed into a valid [`SocketAddr`].
    ///
    /// [`SocketAddr`]: std::net::SocketAddr
    pub fn socket_addr(&self) -> Result<std::net::SocketAddr, String> {
        format!("{}:{}", self.server.bind_address, self.server.bind_port)
            .parse()
            .map_err(|_| {
                format!(
                    "Invalid socket address: {}:{}",
                    self.server.bind_address, self.server.bind_port
                )
            })
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_seconds)
    }

    #[must_use]
    pub fn snapshot_interval(&self) -> Duration {
        Duration::from_secs(self.scheduler.interval_seconds)
    }

    /// Validates the configuration for correctness and consistency.
    ///
    /// Checks include:
    /// - At least one chain is configured, chain ids are unique
    /// - All URLs are properly formatted and token addresses parse
    /// - Sizes, attempts and intervals are greater than zero
    /// - Logging format is either `"json"` or `"pretty"`
    ///
    /// # Errors
    ///
    /// Returns a descriptive error string if validation fails.
    pub fn validate(&self) -> Result<(), String> {
        if self.chains.is_empty() {
            return Err("No chains configured".to_string());
        }

        let mut chain_ids = HashSet::new();
        for chain in &self.chains {
            if !chain_ids.insert(chain.chain_id) {
                return Err(format!("Duplicate chain id: {}", chain.chain_id));
            }
            if !chain.rpc_url.starts_with("http") {
                return Err(format!("Invalid RPC URL for chain {}: {}", chain.name, chain.rpc_url));
            }
            if !chain.ledger_url.starts_with("http") {
                return Err(format!(
                    "Invalid ledger URL for chain {}: {}",
                    chain.name, chain.ledger_url
                ));
            }
            if chain.timeout_seconds == 0 {
                return Err(format!("Timeout must be greater than 0 for chain {}", chain.name));
            }
            chain.token_addresses()?;
        }

        if self.verifier.batch_size == 0 {
            return Err("Verifier batch size must be greater than 0".to_string());
        }

        if self.verifier.max_attempts == 0 {
            return Err("Verifier max attempts must be greater than 0".to_string());
        }

        if self.verifier.max_in_flight == 0 {
            return Err("Verifier max in-flight must be greater than 0".to_string());
        }

        if !(self.verifier.backoff_multiplier.is_finite() && self.verifier.backoff_multiplier >= 1.0)
        {
            return Err("Backoff multiplier must be at least 1.0".to_string());
        }

        if self.ledger.page_size == 0 {
            return Err("Ledger page size must be greater than 0".to_string());
        }

        if self.scheduler.interval_seconds == 0 {
            return Err("Scheduler interval must be greater than 0".to_string());
        }

        if self.server.bind_port == 0 {
            return Err("Bind port must be greater than 0".to_string());
        }

        if self.server.max_concurrent_requests == 0 {
            return Err("Max concurrent requests must be greater than 0".to_string());
        }

        if !["json", "pretty"].contains(&self.logging.format.as_str()) {
            return Err("Logging format must be 'json' or 'pretty'".to_string());
        }

        Ok(())
    }
}
