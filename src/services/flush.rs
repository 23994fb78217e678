use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, warn};

use crate::storage::SigningRateStorage;
use crate::telemetry::{CycleOutcome, FlushMetrics};
use crate::threadsafe::SharedSigningRateTracker;
use crate::wire::SigningRateBucket;

/// Periodically drains a tracker's unflushed buckets into storage.
///
/// Draining removes the tracker's dirty markers, so a failed store must not
/// lose the drained snapshots: they stay in a retry buffer keyed by bucket
/// start (a newer snapshot of the same bucket replaces an older one) and
/// ride along with the next cycle. The fixed-interval timer is the retry
/// mechanism; there is no backoff.
pub struct FlushService {
    shutdown: watch::Sender<bool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl FlushService {
    pub fn start(
        tracker: SharedSigningRateTracker,
        storage: Arc<dyn SigningRateStorage>,
        cadence: Duration,
    ) -> Self {
        let (tx, mut rx) = watch::channel(false);
        let metrics = FlushMetrics::global().clone();
        let worker = tokio::spawn(async move {
            let mut ticker = time::interval(cadence);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut pending: BTreeMap<u64, Arc<SigningRateBucket>> = BTreeMap::new();
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let started = Instant::now();
                        let (outcome, flushed) =
                            run_cycle(&tracker, storage.as_ref(), &mut pending);
                        metrics.record_cycle(outcome, started.elapsed(), flushed);
                    }
                    changed = rx.changed() => {
                        if changed.is_ok() && *rx.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("signing rate flush loop stopped");
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
                debug!(?err, "flush worker exited with error");
            }
        }
    }
}

fn run_cycle(
    tracker: &SharedSigningRateTracker,
    storage: &dyn SigningRateStorage,
    pending: &mut BTreeMap<u64, Arc<SigningRateBucket>>,
) -> (CycleOutcome, Option<u64>) {
    for bucket in tracker.unflushed_buckets() {
        pending.insert(bucket.start_timestamp, bucket);
    }
    if pending.is_empty() {
        return (CycleOutcome::Skipped, None);
    }

    let batch: Vec<Arc<SigningRateBucket>> = pending.values().cloned().collect();
    match storage.store_buckets(&batch) {
        Ok(()) => {
            debug!(buckets = batch.len(), "flushed signing rate buckets");
            pending.clear();
            (CycleOutcome::Success, Some(batch.len() as u64))
        }
        Err(err) => {
            warn!(
                buckets = batch.len(),
                error = %err,
                "signing rate flush failed; retrying next cycle"
            );
            (CycleOutcome::Error, None)
        }
    }
}
