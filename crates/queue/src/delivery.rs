//! Delivery loop.
//!
//! A single background task that wakes up every `delay` seconds
//! (start-to-start), advances every queued download by one part, hands the
//! part to the [`Deliverer`], and evicts downloads that finished or failed.
//!
//! Fetching happens inline on an entry's first cycle, so one slow source
//! delays the rest of that cycle. The loop has no per-entry timeout and
//! relies on the fetchers' socket timeouts.

use std::sync::Arc;

use chunkcast_settings::{DownloadSettings, SettingsSource};
use chunkcast_transfer::{SplitDownload, TransferError};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::deliver::Deliverer;
use crate::queue::DownloadQueue;
use crate::request::{FAILED_REPLY, too_big_reply};

/// Counts for one servicing pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    /// Entries advanced in this cycle.
    pub serviced: usize,
    /// Parts handed to the deliverer.
    pub delivered: usize,
    /// Downloads whose last part went out.
    pub completed: usize,
    /// Downloads evicted because of an error.
    pub failed: usize,
}

/// What happened to one entry during a cycle.
enum Outcome {
    Delivered,
    Completed,
    Failed,
}

/// Drains a [`DownloadQueue`] one part per entry per cycle.
pub struct DeliveryLoop {
    queue: Arc<DownloadQueue>,
    deliverer: Arc<dyn Deliverer>,
    settings: Arc<dyn SettingsSource>,
}

impl DeliveryLoop {
    pub fn new(
        queue: Arc<DownloadQueue>,
        deliverer: Arc<dyn Deliverer>,
        settings: Arc<dyn SettingsSource>,
    ) -> Self {
        Self {
            queue,
            deliverer,
            settings,
        }
    }

    /// Runs the loop on a new tokio task until `cancel` fires.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }

    /// Services the queue every `delay` until `cancel` fires.
    ///
    /// The delay is re-read from the settings after every cycle. When a cycle
    /// takes longer than the delay, the next one starts immediately.
    /// Downloads still queued at shutdown stay in the queue.
    pub async fn run(self, cancel: CancellationToken) {
        info!("delivery loop started");

        loop {
            let started = Instant::now();
            let report = self.service_cycle(&cancel).await;
            if report.serviced > 0 {
                debug!(
                    serviced = report.serviced,
                    delivered = report.delivered,
                    completed = report.completed,
                    failed = report.failed,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "cycle finished"
                );
            }

            if cancel.is_cancelled() {
                break;
            }

            let delay = DownloadSettings::load(self.settings.as_ref()).delay;
            if let Some(remaining) = delay.checked_sub(started.elapsed()) {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(remaining) => {}
                }
            }
        }

        info!(queued = self.queue.len(), "delivery loop stopped");
    }

    /// Advances every entry queued at the start of the call by one step.
    ///
    /// Entries admitted while the cycle runs wait for the next one. Stops
    /// early, between entries, if `cancel` fires.
    pub async fn service_cycle(&self, cancel: &CancellationToken) -> CycleReport {
        let entries = self.queue.snapshot();
        debug!(queued = entries.len(), "servicing download queue");

        let mut report = CycleReport::default();
        for (requester, entry) in entries {
            if cancel.is_cancelled() {
                break;
            }

            let mut download = entry.lock().await;
            report.serviced += 1;
            match self.service_entry(&requester, &mut download).await {
                Outcome::Delivered => report.delivered += 1,
                Outcome::Completed => {
                    report.delivered += 1;
                    report.completed += 1;
                }
                Outcome::Failed => report.failed += 1,
            }
        }
        report
    }

    async fn service_entry(&self, requester: &str, download: &mut SplitDownload) -> Outcome {
        let chunk = match download.advance().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => {
                warn!(requester, url = download.url(), "download ended before its last part");
                self.fail(requester, None).await;
                return Outcome::Failed;
            }
            Err(e) => {
                self.fail(requester, Some(&e)).await;
                return Outcome::Failed;
            }
        };

        let (index, total) = (chunk.index(), chunk.total());
        let caption = chunk.caption();
        debug!(requester, index, total, "delivering part");
        if let Err(e) = self.deliverer.deliver(requester, chunk, &caption).await {
            warn!(requester, index, total, error = %e, "part delivery failed");
        }

        if index < total {
            return Outcome::Delivered;
        }

        // Run the sequence to its end so the fetched source is removed.
        match download.advance().await {
            Ok(None) => {}
            Ok(Some(extra)) => {
                warn!(requester, index = extra.index(), "unexpected part after the last one");
            }
            Err(e) => warn!(requester, error = %e, "cleanup after last part failed"),
        }
        self.queue.evict(requester);
        info!(requester, parts = total, "download completed");
        Outcome::Completed
    }

    /// Evicts the requester's download and tells them why.
    async fn fail(&self, requester: &str, err: Option<&TransferError>) {
        self.queue.evict(requester);

        let text = match err.and_then(TransferError::size_limit) {
            Some(limit) => {
                info!(requester, limit, "download refused: too big");
                too_big_reply(limit)
            }
            None => {
                match err {
                    Some(e) => error!(requester, error = %e, "download failed"),
                    None => error!(requester, "download failed"),
                }
                FAILED_REPLY.to_string()
            }
        };

        if let Err(e) = self.deliverer.notify(requester, &text).await {
            warn!(requester, error = %e, "failure notice not delivered");
        }
    }
}
