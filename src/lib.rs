//! Control-plane telemetry engine for a data-availability network: tracks,
//! per validator and per quorum, how reliably each validator signs
//! dispersed batches over a sliding time window, and makes that history
//! queryable, persistable, and replicable across processes.
//!
//! The engine is built from a purpose-built random-access ring deque
//! ([`deque::RandomAccessDeque`]) holding time-ordered aggregation buckets
//! ([`bucket::Bucket`]), driven by [`tracker::SigningRateTracker`].
//! Concurrent callers share a tracker through
//! [`threadsafe::SharedSigningRateTracker`]; the background jobs in
//! [`services`] drain dirty buckets into a [`storage::SigningRateStorage`]
//! implementation and replicate a remote tracker into a local follower.
//!
//! Transport for reports and queries is out of scope; the wire shapes in
//! [`wire`] are the exchange format at every process boundary.

pub mod bucket;
pub mod config;
pub mod deque;
pub mod errors;
pub mod services;
pub mod storage;
pub mod telemetry;
pub mod threadsafe;
pub mod tracker;
pub mod types;
pub mod wire;

pub use config::TelemetryConfig;
pub use errors::{TelemetryError, TelemetryResult};
pub use services::{FlushService, MirrorService, Scraper};
pub use storage::{
    load_history, MemorySigningRateStorage, RocksDbSigningRateStorage, SigningRateStorage,
};
pub use threadsafe::SharedSigningRateTracker;
pub use tracker::SigningRateTracker;
pub use types::{QuorumId, SigningRate, ValidatorId};
pub use wire::{QuorumSigningRate, SigningRateBucket, ValidatorSigningRate};
