use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("storage error: {0}")]
    Storage(#[from] rocksdb::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid query range: end {end} must be after start {start}")]
    InvalidQueryRange { start: u64, end: u64 },
    #[error("scrape error: {0}")]
    Scrape(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

pub type TelemetryResult<T> = Result<T, TelemetryError>;
