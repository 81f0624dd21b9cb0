use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::services::queue::QueueManager;
use crate::services::requests::MatchRequestService;

/// Periodic driver for the queue pairing cycle and the expiry sweeps.
///
/// A run-lock keeps cycles from overlapping: two concurrent pairing
/// passes could double-reserve a user's last slot, so a tick that finds
/// the previous one still running is skipped, not queued.
pub struct Scheduler {
    queue: Arc<QueueManager>,
    requests: Arc<MatchRequestService>,
    interval_secs: u64,
    run_lock: Arc<Mutex<()>>,
}

impl Scheduler {
    pub fn new(
        queue: Arc<QueueManager>,
        requests: Arc<MatchRequestService>,
        interval_secs: u64,
    ) -> Self {
        Self {
            queue,
            requests,
            interval_secs: interval_secs.max(1),
            run_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(self.interval_secs));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            tracing::info!("Scheduler started ({}s cadence)", self.interval_secs);

            loop {
                ticker.tick().await;
                self.run_once().await;
            }
        })
    }

    /// One scheduler tick. Every step is idempotent, so a failed step is
    /// logged and retried on the next tick rather than escalated.
    pub async fn run_once(&self) {
        let Ok(_guard) = self.run_lock.try_lock() else {
            tracing::warn!("Previous pairing cycle still running, skipping tick");
            return;
        };

        if let Err(e) = self.queue.expire_stale().await {
            tracing::warn!("Queue expiry sweep failed: {}", e);
        }

        match self.queue.process_batch().await {
            Ok(report) => {
                tracing::debug!(
                    "Cycle done: {} recovered, {} examined, {} pairs, {} reverted",
                    report.recovered,
                    report.examined,
                    report.pairs_created,
                    report.reverted
                );
            }
            Err(e) => tracing::warn!("Pairing cycle failed: {}", e),
        }

        if let Err(e) = self.requests.cleanup_expired().await {
            tracing::warn!("Request expiry sweep failed: {}", e);
        }
    }
}
