use configuration::ConfigError;
use core_types::CoreError;
use partition_source::SourceError;
use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid query: {0}")]
    Core(#[from] CoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Partition source error: {0}")]
    Source(#[from] SourceError),

    #[error("Table operation failed: {0}")]
    Polars(#[from] PolarsError),

    #[error("Failed to convert result rows: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Query did not finish within {secs}s")]
    Timeout { secs: u64 },

    #[error("Every requested year failed ({years:?}); last error: {last_error}")]
    AllYearsFailed { years: Vec<i32>, last_error: String },

    #[error("No data found for '{key}' in years {years:?}")]
    NotFound { key: String, years: Vec<i32> },
}

impl EngineError {
    /// True when the failure came from the remote source throttling us.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            EngineError::Source(e) => e.is_rate_limited(),
            _ => false,
        }
    }
}
