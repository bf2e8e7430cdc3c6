//! Periodic snapshot runs, one task per (chain, token).

use alloy_primitives::Address;
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::broadcast,
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tracing::{error, info};

use crate::pipeline::{PipelineError, SnapshotPipeline};

/// Ticks a single token's pipeline.
///
/// Each run is awaited before the next tick is considered, and ticks missed during a
/// long run are skipped, so runs of one token never overlap or pile up.
pub struct SnapshotScheduler {
    pipeline: Arc<SnapshotPipeline>,
    token: Address,
    interval: Duration,
    run_on_startup: bool,
}

impl SnapshotScheduler {
    #[must_use]
    pub fn new(
        pipeline: Arc<SnapshotPipeline>,
        token: Address,
        interval: Duration,
        run_on_startup: bool,
    ) -> Self {
        Self { pipeline, token, interval, run_on_startup }
    }

    /// Spawns the timer loop. It exits when `shutdown_rx` fires, between runs.
    pub fn start_with_shutdown(self, mut shutdown_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let chain_id = self.pipeline.chain_id();
            let token = self.token;
            let start = if self.run_on_startup {
                Instant::now()
            } else {
                Instant::now() + self.interval
            };
            let mut interval = interval_at(start, self.interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            info!(
                chain_id,
                %token,
                interval_secs = self.interval.as_secs(),
                "snapshot scheduler started"
            );

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        match self.pipeline.run(token).await {
                            Ok(_) | Err(PipelineError::AlreadyRunning(_)) => {}
                            Err(e) => {
                                error!(chain_id, %token, error = %e, "scheduled snapshot run failed");
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!(chain_id, %token, "snapshot scheduler shutting down");
                        break;
                    }
                }
            }
        })
    }
}
