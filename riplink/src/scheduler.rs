//! Periodic reconciliation task

use crate::processor::Processor;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Run a cycle now and then every `interval` until cancelled
///
/// A failed cycle is logged and the loop carries on.
pub fn spawn_scheduler(
    processor: Arc<Processor>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let interval = interval.max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = interval.as_secs(), "Reconciliation scheduler started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = processor.run_cycle().await {
                        error!(error = %e, "Reconciliation cycle failed");
                    }
                }
            }
        }

        info!("Reconciliation scheduler stopped");
    })
}
