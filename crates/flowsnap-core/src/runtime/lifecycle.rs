//! Runtime lifecycle: hydration, scheduler tasks and graceful shutdown.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use tokio::{sync::broadcast, task::JoinHandle};
use tracing::{debug, error, info, warn};

use super::builder::SnapshotRuntimeBuilder;
use crate::{
    config::AppConfig,
    pipeline::SnapshotPipeline,
    scheduler::SnapshotScheduler,
    snapshot::SnapshotStore,
    types::SnapshotKey,
};

/// Owns the pipelines, the shared store and the scheduler tasks.
///
/// Shutdown is coordinated through a broadcast channel: schedulers stop between
/// runs, and `shutdown()` waits for them to exit.
pub struct SnapshotRuntime {
    config: AppConfig,
    store: Arc<SnapshotStore>,
    pipelines: HashMap<u64, Arc<SnapshotPipeline>>,
    targets: Vec<SnapshotKey>,
    shutdown_tx: broadcast::Sender<()>,
    scheduler_tasks: Vec<JoinHandle<()>>,
    shutdown_initiated: Arc<AtomicBool>,
}

impl SnapshotRuntime {
    /// Creates a new builder for constructing a `SnapshotRuntime`.
    #[must_use]
    pub fn builder() -> SnapshotRuntimeBuilder {
        SnapshotRuntimeBuilder::new()
    }

    pub(super) fn new(
        config: AppConfig,
        store: Arc<SnapshotStore>,
        pipelines: HashMap<u64, Arc<SnapshotPipeline>>,
        targets: Vec<SnapshotKey>,
        shutdown_tx: broadcast::Sender<()>,
    ) -> Self {
        Self {
            config,
            store,
            pipelines,
            targets,
            shutdown_tx,
            scheduler_tasks: Vec::new(),
            shutdown_initiated: Arc::new(AtomicBool::new(false)),
        }
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    #[must_use]
    pub fn pipeline(&self, chain_id: u64) -> Option<&Arc<SnapshotPipeline>> {
        self.pipelines.get(&chain_id)
    }

    /// Every configured (chain, token), sorted.
    #[must_use]
    pub fn targets(&self) -> &[SnapshotKey] {
        &self.targets
    }

    /// Creates a new shutdown receiver for external shutdown coordination.
    #[must_use]
    pub fn shutdown_receiver(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Loads the durable snapshot of every configured key. Returns how many were loaded.
    pub async fn hydrate(&self) -> usize {
        let mut loaded = 0;
        for key in &self.targets {
            match self.store.load(key).await {
                Ok(true) => loaded += 1,
                Ok(false) => debug!(%key, "no durable snapshot to hydrate"),
                Err(e) => warn!(%key, error = %e, "failed to hydrate snapshot"),
            }
        }
        info!(loaded, targets = self.targets.len(), "snapshot hydration complete");
        loaded
    }

    /// Spawns one scheduler per configured key. Calling it again is a no-op.
    pub fn start_schedulers(&mut self) -> usize {
        if !self.scheduler_tasks.is_empty() {
            warn!("Schedulers already started");
            return self.scheduler_tasks.len();
        }

        let interval = self.config.snapshot_interval();
        for key in &self.targets {
            let Some(pipeline) = self.pipelines.get(&key.chain_id) else {
                continue;
            };
            let scheduler = SnapshotScheduler::new(
                pipeline.clone(),
                key.token,
                interval,
                self.config.scheduler.run_on_startup,
            );
            self.scheduler_tasks.push(scheduler.start_with_shutdown(self.shutdown_tx.subscribe()));
        }

        info!(schedulers = self.scheduler_tasks.len(), "Snapshot schedulers started");
        self.scheduler_tasks.len()
    }

    /// Stops every scheduler and waits for them to exit.
    ///
    /// A run in progress is allowed to finish. This method is idempotent.
    pub async fn shutdown(&mut self) {
        if self
            .shutdown_initiated
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("Shutdown already initiated, ignoring duplicate call");
            return;
        }

        info!("Initiating flowsnap runtime shutdown");
        if let Err(e) = self.shutdown_tx.send(()) {
            debug!(error = %e, "Shutdown signal had no receivers");
        }

        for task in self.scheduler_tasks.drain(..) {
            match task.await {
                Ok(()) => {}
                Err(e) if e.is_cancelled() => debug!("Scheduler task cancelled"),
                Err(e) => error!(error = %e, "Scheduler task failed"),
            }
        }

        info!("flowsnap runtime shutdown complete");
    }
}

const _: () = {
    const fn assert_send<T: Send>() {}
    const fn assert_sync<T: Sync>() {}
    let _ = assert_send::<SnapshotRuntime>;
    let _ = assert_sync::<SnapshotRuntime>;
};
