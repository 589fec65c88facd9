use core_types::PartitionYear;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Failed to reach the partition store: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("The partition store is rate limiting requests (retry after {retry_after_secs:?}s)")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Partition for year {0} was not found")]
    PartitionNotFound(PartitionYear),

    #[error("The partition store returned HTTP {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("Failed to decode partition data: {0}")]
    Decode(#[from] polars::prelude::PolarsError),

    #[error("Malformed parquet file: {0}")]
    Malformed(String),

    #[error("Failed to deserialize the partition listing: {0}")]
    Listing(#[from] serde_json::Error),

    #[error("Invalid access credential: {0}")]
    InvalidCredential(String),

    #[error("A background decoding task failed: {0}")]
    Task(String),
}

impl SourceError {
    /// Whether the remote store rejected the call because of its request-rate limit.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            SourceError::RateLimited { .. } => true,
            SourceError::Remote { status, .. } => *status == 429,
            SourceError::Transport(e) => e.status().is_some_and(|s| s.as_u16() == 429),
            _ => false,
        }
    }
}
