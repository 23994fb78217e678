//! Schema-neutral snapshot types exchanged with storage adapters, dump
//! consumers, and mirror followers. Validator and quorum lists are sorted
//! so serialized output is deterministic.

use serde::{Deserialize, Serialize};

use crate::types::{QuorumId, SigningRate, ValidatorId};

/// Signing counters for one validator, as they appear in a serialized
/// bucket.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorSigningRate {
    pub id: ValidatorId,
    pub signed_batches: u64,
    pub unsigned_batches: u64,
    pub signed_bytes: u64,
    pub unsigned_bytes: u64,
    pub signing_latency_nanos: u64,
}

impl ValidatorSigningRate {
    pub fn new(id: ValidatorId, rate: &SigningRate) -> Self {
        Self {
            id,
            signed_batches: rate.signed_batches,
            unsigned_batches: rate.unsigned_batches,
            signed_bytes: rate.signed_bytes,
            unsigned_bytes: rate.unsigned_bytes,
            signing_latency_nanos: rate.signing_latency_nanos,
        }
    }

    pub fn rate(&self) -> SigningRate {
        SigningRate {
            signed_batches: self.signed_batches,
            unsigned_batches: self.unsigned_batches,
            signed_bytes: self.signed_bytes,
            unsigned_bytes: self.unsigned_bytes,
            signing_latency_nanos: self.signing_latency_nanos,
        }
    }
}

/// Per-quorum validator signing rates, sorted by validator id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuorumSigningRate {
    pub quorum_id: QuorumId,
    pub validators: Vec<ValidatorSigningRate>,
}

/// A serialized aggregation bucket: one bounded time span of signing-rate
/// history. Timestamps are Unix seconds; `end_timestamp` records the last
/// observed activity in the bucket.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningRateBucket {
    pub start_timestamp: u64,
    pub end_timestamp: u64,
    pub quorums: Vec<QuorumSigningRate>,
}
