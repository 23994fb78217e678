//! Mutex-serialized handle for sharing one tracker across tasks.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

use crate::errors::TelemetryResult;
use crate::tracker::SigningRateTracker;
use crate::types::{QuorumId, SigningRate, ValidatorId};
use crate::wire::SigningRateBucket;

/// Cloneable, thread-safe handle over a [`SigningRateTracker`]. Every
/// operation holds the tracker's mutex for its full duration; the values
/// returned are deep snapshots, safe to read (and persist) without the
/// lock. Do not call back into the same handle from inside one of its own
/// operations.
#[derive(Clone)]
pub struct SharedSigningRateTracker {
    inner: Arc<Mutex<SigningRateTracker>>,
}

impl SharedSigningRateTracker {
    pub fn new(tracker: SigningRateTracker) -> Self {
        Self {
            inner: Arc::new(Mutex::new(tracker)),
        }
    }

    /// Record a successfully signed batch, stamped with the current wall
    /// clock.
    pub fn report_success(
        &self,
        quorum: QuorumId,
        validator: ValidatorId,
        batch_size_bytes: u64,
        latency: Duration,
    ) {
        self.inner
            .lock()
            .report_success(unix_now(), quorum, validator, batch_size_bytes, latency);
    }

    /// Record a batch the validator failed to sign, stamped with the
    /// current wall clock.
    pub fn report_failure(&self, quorum: QuorumId, validator: ValidatorId, batch_size_bytes: u64) {
        self.inner
            .lock()
            .report_failure(unix_now(), quorum, validator, batch_size_bytes);
    }

    pub fn validator_signing_rate(
        &self,
        quorum: QuorumId,
        validator: ValidatorId,
        start: u64,
        end: u64,
    ) -> TelemetryResult<SigningRate> {
        self.inner
            .lock()
            .validator_signing_rate(quorum, validator, start, end)
    }

    pub fn signing_rate_dump(&self, since: u64) -> Vec<Arc<SigningRateBucket>> {
        self.inner.lock().signing_rate_dump(since)
    }

    pub fn unflushed_buckets(&self) -> Vec<Arc<SigningRateBucket>> {
        self.inner.lock().unflushed_buckets()
    }

    pub fn update_last_bucket(&self, record: &SigningRateBucket) {
        self.inner.lock().update_last_bucket(record);
    }

    pub fn last_bucket_start_time(&self) -> Option<u64> {
        self.inner.lock().last_bucket_start_time()
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_and_query_through_shared_handle() {
        let tracker =
            SigningRateTracker::new(Duration::from_secs(60), Duration::from_secs(6_000))
                .expect("valid tracker parameters");
        let shared = SharedSigningRateTracker::new(tracker);
        let validator = ValidatorId([1; 32]);

        shared.report_success(0, validator, 800, Duration::from_millis(25));
        shared.report_failure(0, validator, 200);

        let start = shared.last_bucket_start_time().expect("bucket exists");
        let rate = shared
            .validator_signing_rate(0, validator, start, start + 61)
            .expect("valid range");
        assert_eq!(rate.signed_batches, 1);
        assert_eq!(rate.signed_bytes, 800);
        assert_eq!(rate.unsigned_batches, 1);
        assert_eq!(rate.unsigned_bytes, 200);

        let clone = shared.clone();
        assert_eq!(clone.unflushed_buckets().len(), 1);
        assert!(shared.unflushed_buckets().is_empty());
    }
}
