use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier for a quorum, a named partition of validators.
pub type QuorumId = u32;

/// Fixed-length opaque identifier for a validator. Equality is byte-exact.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ValidatorId(pub [u8; 32]);

impl ValidatorId {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl From<[u8; 32]> for ValidatorId {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for ValidatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for ValidatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValidatorId({})", hex::encode(self.0))
    }
}

/// Aggregated signing counters for one validator in one quorum over one
/// bucket's lifetime. All counters increase monotonically while the bucket
/// is live.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningRate {
    pub signed_batches: u64,
    pub unsigned_batches: u64,
    pub signed_bytes: u64,
    pub unsigned_bytes: u64,
    pub signing_latency_nanos: u64,
}

impl SigningRate {
    /// Add another counter set into this one, field by field.
    pub fn merge(&mut self, other: &SigningRate) {
        self.signed_batches += other.signed_batches;
        self.unsigned_batches += other.unsigned_batches;
        self.signed_bytes += other.signed_bytes;
        self.unsigned_bytes += other.unsigned_bytes;
        self.signing_latency_nanos += other.signing_latency_nanos;
    }
}
