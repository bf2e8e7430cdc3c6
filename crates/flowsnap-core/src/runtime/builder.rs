//! Builder for wiring configuration into pipelines, the store and schedulers.

use std::{collections::HashMap, sync::Arc};
use thiserror::Error;
use tokio::sync::{broadcast, Semaphore};
use tracing::{debug, info};

use super::lifecycle::SnapshotRuntime;
use crate::{
    config::AppConfig,
    ledger::SubgraphClient,
    pipeline::{PipelineConfig, SnapshotPipeline},
    rpc::{HttpClient, HttpClientConfig, JsonRpcChainClient},
    snapshot::{SnapshotFileStore, SnapshotStore},
    types::SnapshotKey,
};

/// Errors that can occur during runtime initialization.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    ConfigValidation(String),

    /// Generic initialization error
    #[error("Runtime initialization failed: {0}")]
    Initialization(String),
}

#[derive(Clone)]
struct RuntimeOptions {
    persistence: bool,
    shutdown_channel_capacity: usize,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self { persistence: true, shutdown_channel_capacity: 16 }
    }
}

/// Builder for constructing a [`SnapshotRuntime`].
///
/// # Examples
///
/// ```no_run
/// # use flowsnap_core::{config::AppConfig, runtime::SnapshotRuntimeBuilder};
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = AppConfig::load()?;
///
/// let runtime = SnapshotRuntimeBuilder::new().with_config(config).build()?;
/// # Ok(())
/// # }
/// ```
pub struct SnapshotRuntimeBuilder {
    config: Option<AppConfig>,
    options: RuntimeOptions,
}

impl SnapshotRuntimeBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self { config: None, options: RuntimeOptions::default() }
    }

    #[must_use]
    pub fn with_config(mut self, config: AppConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Keeps snapshots in memory only; nothing is read from or written to `storage.data_dir`.
    #[must_use]
    pub fn disable_persistence(mut self) -> Self {
        self.options.persistence = false;
        self
    }

    /// Sets custom shutdown channel capacity (default: 16).
    #[must_use]
    pub fn with_shutdown_channel_capacity(mut self, capacity: usize) -> Self {
        self.options.shutdown_channel_capacity = capacity;
        self
    }

    /// Builds the runtime. No background task is started until
    /// [`SnapshotRuntime::start_schedulers`] is called.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeError` if configuration is missing or invalid, or the HTTP
    /// client cannot be built.
    pub fn build(self) -> Result<SnapshotRuntime, RuntimeError> {
        let config = self.config.ok_or_else(|| {
            RuntimeError::ConfigValidation("No configuration provided".to_string())
        })?;

        config.validate().map_err(RuntimeError::ConfigValidation)?;

        info!(
            chains = config.chains.len(),
            persistence = self.options.persistence,
            verify_all = config.verifier.verify_all,
            "Initializing flowsnap runtime"
        );

        let (shutdown_tx, _) =
            broadcast::channel::<()>(self.options.shutdown_channel_capacity.max(1));

        let http_config = HttpClientConfig {
            concurrent_limit: HttpClientConfig::default()
                .concurrent_limit
                .max(config.verifier.max_in_flight),
            ..HttpClientConfig::default()
        };
        let http_client = Arc::new(
            HttpClient::with_config(http_config)
                .map_err(|e| RuntimeError::Initialization(e.to_string()))?,
        );
        debug!("HTTP client initialized");

        let in_flight_reads = Arc::new(Semaphore::new(config.verifier.max_in_flight));

        let store = Arc::new(if self.options.persistence {
            SnapshotStore::with_persistence(SnapshotFileStore::new(&config.storage.data_dir))
        } else {
            SnapshotStore::in_memory()
        });
        debug!(data_dir = %config.storage.data_dir, "Snapshot store initialized");

        let pipeline_config = PipelineConfig {
            page_size: config.ledger.page_size,
            verifier: config.verifier.verifier_config(),
            verify_all: config.verifier.verify_all,
        };

        let mut pipelines = HashMap::with_capacity(config.chains.len());
        let mut targets = Vec::new();
        for chain in &config.chains {
            let ledger = Arc::new(SubgraphClient::new(
                chain.ledger_url.clone(),
                http_client.clone(),
                chain.timeout(),
            ));
            let client = Arc::new(JsonRpcChainClient::new(
                chain.rpc_url.clone(),
                http_client.clone(),
                chain.timeout(),
            ));
            let pipeline = SnapshotPipeline::new(
                chain.chain_id,
                ledger,
                client,
                store.clone(),
                pipeline_config,
                in_flight_reads.clone(),
            );
            pipelines.insert(chain.chain_id, Arc::new(pipeline));

            let tokens = chain.token_addresses().map_err(RuntimeError::ConfigValidation)?;
            targets.extend(tokens.into_iter().map(|token| SnapshotKey::new(chain.chain_id, token)));

            info!(
                chain_id = chain.chain_id,
                name = %chain.name,
                tokens = chain.tokens.len(),
                "Chain pipeline initialized"
            );
        }
        targets.sort_unstable();
        targets.dedup();

        let runtime = SnapshotRuntime::new(config, store, pipelines, targets, shutdown_tx);
        info!("flowsnap runtime initialization complete");
        Ok(runtime)
    }
}

impl Default for SnapshotRuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
