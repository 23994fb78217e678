//! The mutable aggregation bucket owned by a tracker.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::types::{QuorumId, SigningRate, ValidatorId};
use crate::wire::{QuorumSigningRate, SigningRateBucket, ValidatorSigningRate};

/// Aggregation record for one time span. Counters for a `(quorum,
/// validator)` pair are created on first touch; a validator absent from the
/// maps has simply not been observed, which carries no up/down meaning by
/// itself.
///
/// `start_timestamp` is fixed at creation. `end_timestamp` tracks the last
/// observed activity and is what dump queries and eviction key off.
/// Report routing instead uses the bucket's nominal span
/// (see [`Bucket::spans`]): every in-window report accumulates here, and a
/// report at exactly `start + span` opens a fresh bucket.
pub struct Bucket {
    start_timestamp: u64,
    end_timestamp: u64,
    span: u64,
    rates: BTreeMap<QuorumId, BTreeMap<ValidatorId, SigningRate>>,
    /// Cached serialized form, dropped on every mutation and rebuilt on the
    /// next snapshot request.
    snapshot: Option<Arc<SigningRateBucket>>,
}

impl Bucket {
    /// A fresh bucket opened by a report observed at `now` (Unix seconds).
    pub fn new(now: u64, span: u64) -> Self {
        Self {
            start_timestamp: now,
            end_timestamp: now,
            span,
            rates: BTreeMap::new(),
            snapshot: None,
        }
    }

    /// Rebuild a bucket from its serialized form, e.g. when mirroring a
    /// remote tracker or replaying persisted history.
    pub fn from_snapshot(record: &SigningRateBucket, span: u64) -> Self {
        let mut rates: BTreeMap<QuorumId, BTreeMap<ValidatorId, SigningRate>> = BTreeMap::new();
        for quorum in &record.quorums {
            let validators = rates.entry(quorum.quorum_id).or_default();
            for validator in &quorum.validators {
                validators.insert(validator.id, validator.rate());
            }
        }
        Self {
            start_timestamp: record.start_timestamp,
            end_timestamp: record.end_timestamp,
            span,
            rates,
            snapshot: None,
        }
    }

    pub fn start_timestamp(&self) -> u64 {
        self.start_timestamp
    }

    /// Timestamp of the last report that landed in this bucket.
    pub fn end_timestamp(&self) -> u64 {
        self.end_timestamp
    }

    /// Whether a report observed at `timestamp` belongs in this bucket:
    /// membership in the nominal span `[start, start + span)`.
    pub fn spans(&self, timestamp: u64) -> bool {
        timestamp >= self.start_timestamp && timestamp < self.start_timestamp + self.span
    }

    /// Whether `timestamp` falls inside the observed activity interval
    /// `[start, end]`.
    pub fn contains(&self, timestamp: u64) -> bool {
        timestamp >= self.start_timestamp && timestamp <= self.end_timestamp
    }

    /// Record a successfully signed batch for `(quorum, validator)`.
    pub fn report_success(
        &mut self,
        now: u64,
        quorum: QuorumId,
        validator: ValidatorId,
        batch_size_bytes: u64,
        latency: Duration,
    ) {
        let rate = self.rate_entry(quorum, validator);
        rate.signed_batches += 1;
        rate.signed_bytes += batch_size_bytes;
        rate.signing_latency_nanos += latency.as_nanos() as u64;
        self.touch(now);
    }

    /// Record a batch that `(quorum, validator)` failed to sign.
    pub fn report_failure(
        &mut self,
        now: u64,
        quorum: QuorumId,
        validator: ValidatorId,
        batch_size_bytes: u64,
    ) {
        let rate = self.rate_entry(quorum, validator);
        rate.unsigned_batches += 1;
        rate.unsigned_bytes += batch_size_bytes;
        self.touch(now);
    }

    /// The counters for a single validator, if it has been observed in this
    /// bucket.
    pub fn validator_rate(&self, quorum: QuorumId, validator: ValidatorId) -> Option<&SigningRate> {
        self.rates.get(&quorum)?.get(&validator)
    }

    /// Deep, sorted serialized form of this bucket. The result is cached:
    /// repeated calls return the identical `Arc` until the next mutation.
    pub fn snapshot(&mut self) -> Arc<SigningRateBucket> {
        if let Some(snapshot) = &self.snapshot {
            return Arc::clone(snapshot);
        }
        let quorums = self
            .rates
            .iter()
            .map(|(quorum_id, validators)| QuorumSigningRate {
                quorum_id: *quorum_id,
                validators: validators
                    .iter()
                    .map(|(id, rate)| ValidatorSigningRate::new(*id, rate))
                    .collect(),
            })
            .collect();
        let snapshot = Arc::new(SigningRateBucket {
            start_timestamp: self.start_timestamp,
            end_timestamp: self.end_timestamp,
            quorums,
        });
        self.snapshot = Some(Arc::clone(&snapshot));
        snapshot
    }

    fn rate_entry(&mut self, quorum: QuorumId, validator: ValidatorId) -> &mut SigningRate {
        self.rates
            .entry(quorum)
            .or_default()
            .entry(validator)
            .or_default()
    }

    fn touch(&mut self, now: u64) {
        self.end_timestamp = self.end_timestamp.max(now);
        self.snapshot = None;
    }
}
