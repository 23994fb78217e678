use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{TelemetryError, TelemetryResult};

const DEFAULT_BUCKET_SPAN_SECS: u64 = 60;
const DEFAULT_RETENTION_SECS: u64 = 6_000;
const DEFAULT_FLUSH_INTERVAL_SECS: u64 = 60;
const DEFAULT_SCRAPE_INTERVAL_SECS: u64 = 10;
const DEFAULT_INITIAL_BUCKET_CAPACITY: usize = 32;

/// Configuration for a signing-rate tracker and its background jobs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Wall-clock time covered by one aggregation bucket, in seconds.
    #[serde(default = "default_bucket_span_secs")]
    pub bucket_span_secs: u64,
    /// How far back in time buckets are retained before eviction, in
    /// seconds.
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,
    /// Cadence of the background flush job, in seconds.
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,
    /// Cadence of the follower-side mirror job, in seconds.
    #[serde(default = "default_scrape_interval_secs")]
    pub scrape_interval_secs: u64,
    /// Initial capacity of the bucket deque.
    #[serde(default = "default_initial_bucket_capacity")]
    pub initial_bucket_capacity: usize,
}

fn default_bucket_span_secs() -> u64 {
    DEFAULT_BUCKET_SPAN_SECS
}

fn default_retention_secs() -> u64 {
    DEFAULT_RETENTION_SECS
}

fn default_flush_interval_secs() -> u64 {
    DEFAULT_FLUSH_INTERVAL_SECS
}

fn default_scrape_interval_secs() -> u64 {
    DEFAULT_SCRAPE_INTERVAL_SECS
}

fn default_initial_bucket_capacity() -> usize {
    DEFAULT_INITIAL_BUCKET_CAPACITY
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            bucket_span_secs: DEFAULT_BUCKET_SPAN_SECS,
            retention_secs: DEFAULT_RETENTION_SECS,
            flush_interval_secs: DEFAULT_FLUSH_INTERVAL_SECS,
            scrape_interval_secs: DEFAULT_SCRAPE_INTERVAL_SECS,
            initial_bucket_capacity: DEFAULT_INITIAL_BUCKET_CAPACITY,
        }
    }
}

impl TelemetryConfig {
    pub fn load(path: &Path) -> TelemetryResult<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|err| TelemetryError::Config(format!("unable to parse config: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> TelemetryResult<()> {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)?;
        let encoded = toml::to_string_pretty(self)
            .map_err(|err| TelemetryError::Config(format!("unable to encode config: {err}")))?;
        fs::write(path, encoded)?;
        Ok(())
    }

    pub fn validate(&self) -> TelemetryResult<()> {
        if self.bucket_span_secs < 1 {
            return Err(TelemetryError::Config(
                "bucket span must be at least one second".into(),
            ));
        }
        if self.retention_secs < 1 {
            return Err(TelemetryError::Config(
                "retention span must be at least one second".into(),
            ));
        }
        if self.flush_interval_secs < 1 {
            return Err(TelemetryError::Config(
                "flush interval must be at least one second".into(),
            ));
        }
        if self.scrape_interval_secs < 1 {
            return Err(TelemetryError::Config(
                "scrape interval must be at least one second".into(),
            ));
        }
        Ok(())
    }

    pub fn bucket_span(&self) -> Duration {
        Duration::from_secs(self.bucket_span_secs)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }

    pub fn scrape_interval(&self) -> Duration {
        Duration::from_secs(self.scrape_interval_secs)
    }
}
