use core_types::columns::{DEFAULT_CATEGORY_COLUMN, DEFAULT_KEY_COLUMN};
use core_types::year::{FIRST_AVAILABLE_YEAR, LAST_AVAILABLE_YEAR};
use serde::Deserialize;
use std::path::PathBuf;

/// The root configuration structure for the entire application.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub registry: RegistryConfig,
    pub remote: RemoteConfig,
    pub engine: EngineConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
}

/// The contiguous range of yearly partitions the dataset publishes.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub first_year: i32,
    pub last_year: i32,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            first_year: FIRST_AVAILABLE_YEAR,
            last_year: LAST_AVAILABLE_YEAR,
        }
    }
}

/// Where the parquet partitions live and how to reach them.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL of the dataset hub.
    pub endpoint: String,
    /// Dataset repository, `owner/name`.
    pub dataset: String,
    /// Git revision of the dataset repository.
    pub revision: String,
    /// Directory inside the repository holding the `year=YYYY` partitions.
    pub partition_prefix: String,
    /// Optional bearer token. Anonymous access is rate-limited more aggressively.
    pub access_token: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://huggingface.co".to_string(),
            dataset: "irlspbru/RFSD".to_string(),
            revision: "main".to_string(),
            partition_prefix: "RFSD".to_string(),
            access_token: None,
            request_timeout_secs: 300,
        }
    }
}

/// Query-time behaviour of the engine.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Pause between consecutive per-year remote calls of one aggregation.
    pub pacing_interval_ms: u64,
    /// Maximum number of category rows scanned per year.
    pub sector_scan_cap: usize,
    pub default_limit: usize,
    pub max_limit: usize,
    /// Upper bound on the rows `sample` returns.
    pub max_sample_rows: usize,
    /// Caller-level deadline for one query. Zero disables it.
    pub query_timeout_secs: u64,
    pub key_column: String,
    pub category_column: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pacing_interval_ms: 500,
            sector_scan_cap: 100_000,
            default_limit: 200,
            max_limit: 1000,
            max_sample_rows: 100,
            query_timeout_secs: 600,
            key_column: DEFAULT_KEY_COLUMN.to_string(),
            category_column: DEFAULT_CATEGORY_COLUMN.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Years materialized into the partition cache once at startup.
    pub preload_years: Vec<i32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Full,
    Compact,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Fallback filter directive when `RUST_LOG` is not set.
    pub level: String,
    pub format: LogFormat,
    /// When set, logs are also written to daily-rolling files in this directory.
    pub directory: Option<PathBuf>,
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Full,
            directory: None,
            file_prefix: "rfsd-engine.log".to_string(),
        }
    }
}
