use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, warn};

use crate::errors::TelemetryResult;
use crate::telemetry::{CycleOutcome, MirrorMetrics};
use crate::threadsafe::SharedSigningRateTracker;
use crate::wire::SigningRateBucket;

/// Source of buckets for a mirror loop, typically a client of the
/// authoritative tracker's dump endpoint. The transport behind it is the
/// implementer's business.
#[async_trait]
pub trait Scraper: Send + Sync {
    /// Fetch all buckets with activity after `since`, in chronological
    /// order.
    async fn scrape(&self, since: u64) -> TelemetryResult<Vec<SigningRateBucket>>;
}

/// Follower-side replication loop: periodically asks a [`Scraper`] for
/// buckets newer than its watermark and folds them into a local tracker
/// via the mirror path.
///
/// The watermark (`previous_scrape_time`) advances to the newest activity
/// timestamp observed, and only on success, so a failed or empty scrape is
/// retried naturally by the next tick. The still-open source bucket is
/// re-fetched whenever its activity advances, so the follower converges on
/// the source's view.
pub struct MirrorService {
    shutdown: watch::Sender<bool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl MirrorService {
    pub fn start(
        tracker: SharedSigningRateTracker,
        scraper: Arc<dyn Scraper>,
        cadence: Duration,
    ) -> Self {
        let (tx, mut rx) = watch::channel(false);
        let metrics = MirrorMetrics::global().clone();
        let worker = tokio::spawn(async move {
            let mut ticker = time::interval(cadence);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut previous_scrape_time = 0u64;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let started = Instant::now();
                        let (outcome, scraped) =
                            run_cycle(&tracker, scraper.as_ref(), &mut previous_scrape_time).await;
                        metrics.record_cycle(outcome, started.elapsed(), scraped);
                    }
                    changed = rx.changed() => {
                        if changed.is_ok() && *rx.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("signing rate mirror loop stopped");
        });

        Self {
            shutdown: tx,
            worker: Mutex::new(Some(worker)),
        }
    }

    pub async fn shutdown(&self) {
        if self.shutdown.send(true).is_err() {
            return;
        }
        if let Some(handle) = self.worker.lock().await.take() {
            if let Err(err) = handle.await {
                debug!(?err, "mirror worker exited with error");
            }
        }
    }
}

async fn run_cycle(
    tracker: &SharedSigningRateTracker,
    scraper: &dyn Scraper,
    previous_scrape_time: &mut u64,
) -> (CycleOutcome, Option<u64>) {
    let buckets = match scraper.scrape(*previous_scrape_time).await {
        Ok(buckets) => buckets,
        Err(err) => {
            warn!(
                since = *previous_scrape_time,
                error = %err,
                "signing rate scrape failed; retrying next cycle"
            );
            return (CycleOutcome::Error, None);
        }
    };
    if buckets.is_empty() {
        return (CycleOutcome::Skipped, None);
    }

    let mut watermark = *previous_scrape_time;
    for bucket in &buckets {
        tracker.update_last_bucket(bucket);
        watermark = watermark.max(bucket.end_timestamp);
    }
    *previous_scrape_time = watermark;
    debug!(
        buckets = buckets.len(),
        watermark, "replayed mirrored signing rate buckets"
    );
    (CycleOutcome::Success, Some(buckets.len() as u64))
}
