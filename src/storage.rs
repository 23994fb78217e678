//! Persistence boundary for signing-rate history.
//!
//! The tracker itself never performs I/O; a flusher drains its dirty
//! buckets through [`SigningRateStorage`] and a one-time loader replays
//! persisted history at startup.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, IteratorMode, MultiThreaded,
    Options,
};
use tracing::info;

use crate::errors::{TelemetryError, TelemetryResult};
use crate::threadsafe::SharedSigningRateTracker;
use crate::wire::SigningRateBucket;

/// Narrow persistence interface for signing-rate buckets. `store_buckets`
/// is an idempotent upsert keyed by bucket start timestamp; `load_buckets`
/// returns every persisted bucket whose activity ended at or after `since`,
/// in chronological order.
pub trait SigningRateStorage: Send + Sync {
    fn store_buckets(&self, buckets: &[Arc<SigningRateBucket>]) -> TelemetryResult<()>;

    fn load_buckets(&self, since: u64) -> TelemetryResult<Vec<SigningRateBucket>>;
}

pub(crate) const CF_SIGNING_RATE: &str = "signing_rate_buckets";

/// RocksDB-backed bucket storage. Keys are big-endian start timestamps so
/// the column family's lexicographic iteration order is chronological
/// order; values are bincode-encoded buckets.
pub struct RocksDbSigningRateStorage {
    db: DBWithThreadMode<MultiThreaded>,
}

impl RocksDbSigningRateStorage {
    pub fn open(path: &Path) -> TelemetryResult<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        let cf_descriptors = vec![ColumnFamilyDescriptor::new(
            CF_SIGNING_RATE,
            Options::default(),
        )];
        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)?;
        Ok(Self { db })
    }

    fn buckets_cf(&self) -> TelemetryResult<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(CF_SIGNING_RATE)
            .ok_or_else(|| TelemetryError::Config("missing signing rate column family".into()))
    }
}

impl SigningRateStorage for RocksDbSigningRateStorage {
    fn store_buckets(&self, buckets: &[Arc<SigningRateBucket>]) -> TelemetryResult<()> {
        let cf = self.buckets_cf()?;
        for bucket in buckets {
            let key = bucket.start_timestamp.to_be_bytes();
            let value = bincode::serialize(bucket.as_ref())?;
            self.db.put_cf(&cf, key, value)?;
        }
        Ok(())
    }

    fn load_buckets(&self, since: u64) -> TelemetryResult<Vec<SigningRateBucket>> {
        let cf = self.buckets_cf()?;
        let mut buckets = Vec::new();
        for entry in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_, value) = entry?;
            let bucket: SigningRateBucket = bincode::deserialize(&value)?;
            if bucket.end_timestamp >= since {
                buckets.push(bucket);
            }
        }
        Ok(buckets)
    }
}

/// In-memory bucket storage: the test double, also usable as a
/// single-process default where durability is not required.
#[derive(Default)]
pub struct MemorySigningRateStorage {
    buckets: RwLock<BTreeMap<u64, SigningRateBucket>>,
}

impl MemorySigningRateStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.read().len()
    }
}

impl SigningRateStorage for MemorySigningRateStorage {
    fn store_buckets(&self, buckets: &[Arc<SigningRateBucket>]) -> TelemetryResult<()> {
        let mut stored = self.buckets.write();
        for bucket in buckets {
            stored.insert(bucket.start_timestamp, bucket.as_ref().clone());
        }
        Ok(())
    }

    fn load_buckets(&self, since: u64) -> TelemetryResult<Vec<SigningRateBucket>> {
        Ok(self
            .buckets
            .read()
            .values()
            .filter(|bucket| bucket.end_timestamp >= since)
            .cloned()
            .collect())
    }
}

/// Replay persisted history into a tracker at startup. Buckets are applied
/// in chronological order through the mirror path, so loaded history is
/// never re-marked dirty. Returns the number of buckets replayed.
pub fn load_history(
    storage: &dyn SigningRateStorage,
    tracker: &SharedSigningRateTracker,
    since: u64,
) -> TelemetryResult<usize> {
    let buckets = storage.load_buckets(since)?;
    for bucket in &buckets {
        tracker.update_last_bucket(bucket);
    }
    info!(buckets = buckets.len(), "loaded signing rate history");
    Ok(buckets.len())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::tracker::SigningRateTracker;
    use crate::types::ValidatorId;

    fn sample_bucket(start: u64, end: u64) -> Arc<SigningRateBucket> {
        Arc::new(SigningRateBucket {
            start_timestamp: start,
            end_timestamp: end,
            quorums: Vec::new(),
        })
    }

    #[test]
    fn rocksdb_storage_roundtrips_buckets() {
        let dir = tempfile::tempdir().expect("temp dir");
        let storage = RocksDbSigningRateStorage::open(dir.path()).expect("open storage");

        storage
            .store_buckets(&[
                sample_bucket(100, 160),
                sample_bucket(160, 220),
                sample_bucket(220, 280),
            ])
            .expect("store buckets");

        let all = storage.load_buckets(0).expect("load all");
        assert_eq!(all.len(), 3);
        let starts: Vec<u64> = all.iter().map(|bucket| bucket.start_timestamp).collect();
        assert_eq!(starts, vec![100, 160, 220]);

        // `since` filters on activity end, inclusive.
        let recent = storage.load_buckets(220).expect("load recent");
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].start_timestamp, 160);
    }

    #[test]
    fn rocksdb_store_is_an_upsert() {
        let dir = tempfile::tempdir().expect("temp dir");
        let storage = RocksDbSigningRateStorage::open(dir.path()).expect("open storage");

        storage
            .store_buckets(&[sample_bucket(100, 130)])
            .expect("store bucket");
        storage
            .store_buckets(&[sample_bucket(100, 155)])
            .expect("re-store bucket");

        let all = storage.load_buckets(0).expect("load all");
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].end_timestamp, 155);
    }

    #[test]
    fn memory_storage_matches_contract() {
        let storage = MemorySigningRateStorage::new();
        storage
            .store_buckets(&[sample_bucket(100, 160), sample_bucket(160, 220)])
            .expect("store buckets");
        storage
            .store_buckets(&[sample_bucket(100, 190)])
            .expect("upsert bucket");

        assert_eq!(storage.bucket_count(), 2);
        let loaded = storage.load_buckets(200).expect("load recent");
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].start_timestamp, 160);
    }

    #[test]
    fn load_history_replays_into_tracker() {
        let storage = MemorySigningRateStorage::new();
        let mut source =
            SigningRateTracker::new(Duration::from_secs(60), Duration::from_secs(6_000))
                .expect("valid tracker parameters");
        let validator = ValidatorId([3; 32]);
        source.report_success(1_000, 0, validator, 500, Duration::from_millis(5));
        source.report_success(1_060, 0, validator, 700, Duration::from_millis(5));
        storage
            .store_buckets(&source.signing_rate_dump(0))
            .expect("persist source history");

        let restored = SharedSigningRateTracker::new(
            SigningRateTracker::new(Duration::from_secs(60), Duration::from_secs(6_000))
                .expect("valid tracker parameters"),
        );
        let replayed = load_history(&storage, &restored, 0).expect("load history");
        assert_eq!(replayed, 2);
        assert_eq!(restored.last_bucket_start_time(), Some(1_060));
        let rate = restored
            .validator_signing_rate(0, validator, 1_000, 1_061)
            .expect("valid range");
        assert_eq!(rate.signed_bytes, 1_200);
        // Replayed history belongs to the original owner, not this process.
        assert!(restored.unflushed_buckets().is_empty());
    }
}
