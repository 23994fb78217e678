//! Core signing-rate tracking engine: a chronologically ordered deque of
//! aggregation buckets plus dirty-tracking for persistence and a replay
//! path for mirroring.
//!
//! This type is not safe for concurrent use; multi-threaded callers go
//! through [`crate::threadsafe::SharedSigningRateTracker`].

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::bucket::Bucket;
use crate::config::TelemetryConfig;
use crate::deque::{binary_search_in_ordered_deque, RandomAccessDeque};
use crate::errors::{TelemetryError, TelemetryResult};
use crate::types::{QuorumId, SigningRate, ValidatorId};
use crate::wire::SigningRateBucket;

/// Tracks per-quorum, per-validator signing rates over a sliding window of
/// aggregation buckets. Timestamps are Unix seconds.
///
/// A tracker plays one of two roles, by convention: the source of truth
/// (fed by [`Self::report_success`]/[`Self::report_failure`], drained by
/// [`Self::unflushed_buckets`]) or a read-only mirror (fed by
/// [`Self::update_last_bucket`], which never marks anything dirty).
pub struct SigningRateTracker {
    /// Seconds of wall-clock time covered by one bucket.
    bucket_span: u64,
    /// Seconds of history retained before eviction.
    retention: u64,
    /// Buckets ordered by start timestamp.
    buckets: RandomAccessDeque<Bucket>,
    /// Start timestamps of buckets modified since the last flush.
    unflushed: BTreeSet<u64>,
    /// Snapshots of buckets that were evicted while still dirty. Drained
    /// together with the live dirty set so a slow flusher cannot lose a
    /// bucket to eviction.
    evicted_unflushed: Vec<Arc<SigningRateBucket>>,
}

impl SigningRateTracker {
    /// Create a tracker covering `bucket_span` per bucket and retaining
    /// `retention` of history. Both must be at least one second.
    pub fn new(bucket_span: Duration, retention: Duration) -> TelemetryResult<Self> {
        Self::with_initial_capacity(bucket_span, retention, 0)
    }

    pub fn from_config(config: &TelemetryConfig) -> TelemetryResult<Self> {
        config.validate()?;
        Self::with_initial_capacity(
            config.bucket_span(),
            config.retention(),
            config.initial_bucket_capacity,
        )
    }

    fn with_initial_capacity(
        bucket_span: Duration,
        retention: Duration,
        initial_capacity: usize,
    ) -> TelemetryResult<Self> {
        if bucket_span < Duration::from_secs(1) {
            return Err(TelemetryError::Config(
                "bucket span must be at least one second".into(),
            ));
        }
        if retention < Duration::from_secs(1) {
            return Err(TelemetryError::Config(
                "retention span must be at least one second".into(),
            ));
        }
        Ok(Self {
            bucket_span: bucket_span.as_secs(),
            retention: retention.as_secs(),
            buckets: RandomAccessDeque::new(initial_capacity),
            unflushed: BTreeSet::new(),
            evicted_unflushed: Vec::new(),
        })
    }

    /// Record a successfully signed batch observed at `now`.
    pub fn report_success(
        &mut self,
        now: u64,
        quorum: QuorumId,
        validator: ValidatorId,
        batch_size_bytes: u64,
        latency: Duration,
    ) {
        let start = {
            let bucket = self.mutable_bucket(now);
            bucket.report_success(now, quorum, validator, batch_size_bytes, latency);
            bucket.start_timestamp()
        };
        self.unflushed.insert(start);
    }

    /// Record a batch the validator failed to sign, observed at `now`.
    pub fn report_failure(
        &mut self,
        now: u64,
        quorum: QuorumId,
        validator: ValidatorId,
        batch_size_bytes: u64,
    ) {
        let start = {
            let bucket = self.mutable_bucket(now);
            bucket.report_failure(now, quorum, validator, batch_size_bytes);
            bucket.start_timestamp()
        };
        self.unflushed.insert(start);
    }

    /// Aggregate signing counters for one validator over `[start, end)`.
    /// The window snaps outward to bucket granularity: a bucket overlapping
    /// the window contributes all of its counters.
    ///
    /// Returns an error iff `end <= start`. Querying an empty tracker is
    /// well-defined and yields zero counters.
    pub fn validator_signing_rate(
        &self,
        quorum: QuorumId,
        validator: ValidatorId,
        start: u64,
        end: u64,
    ) -> TelemetryResult<SigningRate> {
        if end <= start {
            return Err(TelemetryError::InvalidQueryRange { start, end });
        }
        if self.buckets.is_empty() {
            return Ok(SigningRate::default());
        }

        let (index, exact) =
            binary_search_in_ordered_deque(&self.buckets, &start, |timestamp, bucket| {
                if *timestamp < bucket.start_timestamp() {
                    Ordering::Less
                } else if *timestamp >= bucket.end_timestamp() {
                    Ordering::Greater
                } else {
                    Ordering::Equal
                }
            });
        // On a miss, step back to the last bucket starting before the
        // window; its span may still overlap the window.
        let index = if !exact && index > 0 { index - 1 } else { index };

        let mut total = SigningRate::default();
        for bucket in self.buckets.iter_from(index) {
            if bucket.start_timestamp() >= end {
                break;
            }
            if let Some(rate) = bucket.validator_rate(quorum, validator) {
                total.merge(rate);
            }
        }
        Ok(total)
    }

    /// Snapshots of all buckets with activity after `since`, in
    /// chronological order.
    ///
    /// Scans from the newest bucket backwards and stops at the first bucket
    /// whose activity ended at or before `since`; callers asking for recent
    /// history never pay for a full scan.
    pub fn signing_rate_dump(&mut self, since: u64) -> Vec<Arc<SigningRateBucket>> {
        let mut dump = Vec::new();
        for index in (0..self.buckets.len()).rev() {
            let Some(bucket) = self.buckets.get_mut(index) else {
                break;
            };
            if bucket.end_timestamp() <= since {
                break;
            }
            dump.push(bucket.snapshot());
        }
        dump.reverse();
        dump
    }

    /// Drain the dirty set: snapshot every bucket modified since the last
    /// call, clear the markers, and return the snapshots sorted by start
    /// time. A caller that fails to persist the result must arrange its own
    /// retry; the markers are gone.
    pub fn unflushed_buckets(&mut self) -> Vec<Arc<SigningRateBucket>> {
        let dirty = std::mem::take(&mut self.unflushed);
        let mut drained: Vec<Arc<SigningRateBucket>> =
            Vec::with_capacity(dirty.len() + self.evicted_unflushed.len());
        drained.append(&mut self.evicted_unflushed);
        for index in 0..self.buckets.len() {
            let Some(bucket) = self.buckets.get_mut(index) else {
                break;
            };
            if dirty.contains(&bucket.start_timestamp()) {
                drained.push(bucket.snapshot());
            }
        }
        drained.sort_by_key(|bucket| bucket.start_timestamp);
        drained
    }

    /// Fold a bucket replicated from an authoritative tracker into this
    /// one. Appends when newer than the local tail, replaces the tail
    /// wholesale on an equal start (the remote is authoritative), and drops
    /// older input: replication must be monotonic, and a misbehaving source
    /// must not be able to crash a follower.
    ///
    /// Mirrored buckets are never marked dirty; a follower does not own the
    /// data it replicates.
    pub fn update_last_bucket(&mut self, record: &SigningRateBucket) {
        let bucket = Bucket::from_snapshot(record, self.bucket_span);
        match self.buckets.back().map(Bucket::start_timestamp) {
            None => {
                let end = bucket.end_timestamp();
                self.buckets.push_back(bucket);
                self.garbage_collect(end);
            }
            Some(last_start) if bucket.start_timestamp() > last_start => {
                let end = bucket.end_timestamp();
                self.buckets.push_back(bucket);
                self.garbage_collect(end);
            }
            Some(last_start) if bucket.start_timestamp() == last_start => {
                if let Some(tail) = self.buckets.back_mut() {
                    *tail = bucket;
                }
            }
            Some(last_start) => {
                warn!(
                    remote_start = record.start_timestamp,
                    local_start = last_start,
                    "ignoring out-of-order mirrored bucket"
                );
            }
        }
    }

    /// Start timestamp of the newest bucket, or `None` if the tracker holds
    /// no history.
    pub fn last_bucket_start_time(&self) -> Option<u64> {
        self.buckets.back().map(Bucket::start_timestamp)
    }

    /// Number of buckets currently retained.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// The bucket new reports at `now` should land in. Appends a fresh
    /// bucket (and garbage-collects) when the newest bucket's span does not
    /// cover `now`; at steady state each new bucket causes at most one
    /// eviction, bounding the latency of a report call.
    fn mutable_bucket(&mut self, now: u64) -> &mut Bucket {
        let needs_new = match self.buckets.back() {
            Some(bucket) => !bucket.spans(now),
            None => true,
        };
        if needs_new {
            self.buckets.push_back(Bucket::new(now, self.bucket_span));
            self.garbage_collect(now);
        }
        self.buckets
            .back_mut()
            .expect("deque is non-empty after insertion")
    }

    /// Evict buckets whose activity ended at or before `now - retention`.
    /// Buckets are chronologically ordered, so the first retained bucket
    /// ends the scan.
    fn garbage_collect(&mut self, now: u64) {
        let cutoff = now.saturating_sub(self.retention);
        while let Some(front) = self.buckets.front() {
            if front.end_timestamp() > cutoff {
                break;
            }
            let Some(mut evicted) = self.buckets.pop_front() else {
                break;
            };
            if self.unflushed.remove(&evicted.start_timestamp()) {
                self.evicted_unflushed.push(evicted.snapshot());
            }
        }
    }
}
