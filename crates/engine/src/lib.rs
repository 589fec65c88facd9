//! # RFSD Query Engine
//!
//! Resolves company-level queries against the year-partitioned financial
//! statements dataset: point lookups, cross-year tables, revenue series, full
//! financial profiles and sector benchmarks.
//!
//! ## Architecture
//!
//! - [`DataEngine`] is the facade. It owns the partition registry and the
//!   engine settings, and shares one [`PartitionCache`] handle with every
//!   query. The cache is injected, so several engines (or tests) can share or
//!   isolate cached partitions as they need.
//! - Multi-year operations read years one after another and isolate their
//!   failures; per-year outcomes and timings end up in the result metadata.
//! - Every query runs inside a `query` span tagged with a fresh `query_id` and
//!   is abandoned after the configured deadline. Abandoning a query never
//!   leaves a partially built partition in the cache.

pub mod error;
pub mod lookup;
pub mod merge;
pub mod pacing;
pub mod profile;
pub mod query;
pub mod sector;
pub mod table;

mod assembler;

pub use error::EngineError;
pub use lookup::LookupOutcome;
pub use merge::diagonal_concat;
pub use pacing::{FixedIntervalPacer, NoPacing, Pacer};
pub use profile::{FinancialProfile, IndicatorRow, RevenuePoint, RevenueSeries};
pub use query::{BenchmarkQuery, TimeseriesQuery};
pub use sector::{
    AggregationRequest, SectorAggregationResult, SectorMeta, SectorReport, SkipReason, YearOutcome,
    RATE_LIMIT_HINT,
};
pub use table::{frame_to_rows, AssembledTable, AssemblyMeta, JsonRow, TableOutput};

use configuration::{registry_from, Config, EngineConfig};
use core_types::year::DEFAULT_HISTORY_YEARS;
use core_types::{ColumnProjection, CoreError, PartitionRegistry, PartitionYear};
use partition_cache::{CacheStats, PartitionCache, PreloadOutcome, PreloadReport};
use partition_source::PartitionSource;
use polars::prelude::DataFrame;
use sector::SectorAggregator;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;
use uuid::Uuid;

/// The query facade over the partition cache.
pub struct DataEngine {
    registry: PartitionRegistry,
    cache: Arc<PartitionCache>,
    settings: EngineConfig,
    pacer: Arc<dyn Pacer>,
}

impl DataEngine {
    /// Creates an engine that paces per-year remote calls by
    /// `settings.pacing_interval_ms`.
    pub fn new(registry: PartitionRegistry, cache: Arc<PartitionCache>, settings: EngineConfig) -> Self {
        let pacer: Arc<dyn Pacer> = if settings.pacing_interval_ms == 0 {
            Arc::new(NoPacing)
        } else {
            Arc::new(FixedIntervalPacer::from_millis(settings.pacing_interval_ms))
        };
        Self {
            registry,
            cache,
            settings,
            pacer,
        }
    }

    /// Builds an engine, and a fresh cache over `source`, from the loaded configuration.
    pub fn from_config(config: &Config, source: Arc<dyn PartitionSource>) -> Result<Self, EngineError> {
        let registry = registry_from(config)?;
        let cache = Arc::new(PartitionCache::new(source));
        Ok(Self::new(registry, cache, config.engine.clone()))
    }

    pub fn with_pacer(mut self, pacer: Arc<dyn Pacer>) -> Self {
        self.pacer = pacer;
        self
    }

    pub fn registry(&self) -> &PartitionRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &Arc<PartitionCache> {
        &self.cache
    }

    pub fn settings(&self) -> &EngineConfig {
        &self.settings
    }

    pub fn list_years(&self) -> Vec<PartitionYear> {
        self.registry.list_years()
    }

    // ==========================================================================
    // Single-year operations. Failures propagate to the caller.
    // ==========================================================================

    /// Column names of a partition, including the synthetic year column.
    pub async fn schema_columns(&self, year: i32) -> Result<Vec<String>, EngineError> {
        let year = self.registry.validate(year)?;
        self.run("schema", async { Ok::<_, EngineError>(self.cache.schema(year).await?) })
            .await
    }

    /// The first `n` rows of a partition.
    pub async fn sample(&self, year: i32, columns: &[String], n: usize) -> Result<DataFrame, EngineError> {
        let year = self.registry.validate(year)?;
        let n = bounded_limit(n, self.settings.max_sample_rows)?;
        let projection = ColumnProjection::new(columns.iter().cloned());
        self.run("sample", async {
            let view = self.cache.get_or_build(year, &projection).await.limit(n);
            Ok::<_, EngineError>(view.collect().await?)
        })
        .await
    }

    /// Materializes one partition, optionally projected. Does not populate the cache.
    pub async fn load_year(&self, year: i32, columns: &[String]) -> Result<DataFrame, EngineError> {
        let year = self.registry.validate(year)?;
        let projection = ColumnProjection::new(columns.iter().cloned());
        self.run("load_year", async {
            Ok::<_, EngineError>(self.cache.get_or_build(year, &projection).await.collect().await?)
        })
        .await
    }

    /// Materializes several partitions and stacks them in the caller's order.
    /// Columns missing from some years are filled with nulls.
    ///
    /// Any failing year fails the call.
    pub async fn load_years(&self, years: &[i32], columns: &[String]) -> Result<DataFrame, EngineError> {
        let years = self.registry.validate_all(years)?;
        let projection = ColumnProjection::new(columns.iter().cloned()).with_year_if(true);
        self.run("load_years", async {
            let mut frames = Vec::with_capacity(years.len());
            for &year in &years {
                frames.push(self.cache.get_or_build(year, &projection).await.collect().await?);
            }
            Ok::<_, EngineError>(diagonal_concat(frames)?)
        })
        .await
    }

    /// Point lookup of `key` in one year.
    pub async fn lookup(
        &self,
        year: i32,
        key: &str,
        columns: &[String],
        limit: Option<usize>,
    ) -> Result<LookupOutcome, EngineError> {
        let year = self.registry.validate(year)?;
        let limit = self.resolve_limit(limit)?;
        let projection = ColumnProjection::new(columns.iter().cloned());
        self.run("lookup", async {
            let outcome =
                lookup::lookup_year(&self.cache, &self.settings.key_column, year, key, &projection, limit).await?;
            Ok::<_, EngineError>(outcome)
        })
        .await
    }

    // ==========================================================================
    // Multi-year operations. Years are isolated from each other.
    // ==========================================================================

    /// One company's rows across years as a single table.
    pub async fn assemble(&self, query: &TimeseriesQuery) -> Result<AssembledTable, EngineError> {
        let years = self.registry.validate_all(&query.resolved_years())?;
        let limit = self.resolve_limit(query.limit)?;
        let projection = ColumnProjection::new(query.resolved_fields());
        self.run("assemble", async {
            assembler::assemble(&self.cache, &self.settings.key_column, &years, &query.key, &projection, limit)
                .await
        })
        .await
    }

    /// Revenue per year for one company. Defaults to 2019-2023.
    pub async fn revenue_timeseries(&self, key: &str, years: Option<&[i32]>) -> Result<RevenueSeries, EngineError> {
        let years = self.registry.validate_all(years.unwrap_or(DEFAULT_HISTORY_YEARS))?;
        self.run("revenue_timeseries", async {
            profile::revenue_timeseries(&self.cache, &self.settings.key_column, &years, key).await
        })
        .await
    }

    /// Every financial line of one company across years. Defaults to 2019-2023.
    pub async fn financial_profile(&self, key: &str, years: Option<&[i32]>) -> Result<FinancialProfile, EngineError> {
        let years = self.registry.validate_all(years.unwrap_or(DEFAULT_HISTORY_YEARS))?;
        self.run("financial_profile", async {
            profile::financial_profile(&self.cache, &self.settings.key_column, &years, key).await
        })
        .await
    }

    /// Compares one company with the median of its category, year by year.
    pub async fn sector_benchmark(&self, query: &BenchmarkQuery) -> Result<SectorReport, EngineError> {
        let metrics = query.resolved_metrics();
        if metrics.is_empty() {
            return Err(CoreError::EmptyMetricList.into());
        }
        let request = AggregationRequest {
            key: query.key.clone(),
            years: self.registry.validate_all(&query.resolved_years())?,
            metrics,
            scan_cap: match query.scan_cap {
                Some(0) => {
                    return Err(CoreError::InvalidLimit {
                        limit: 0,
                        max: self.settings.sector_scan_cap,
                    }
                    .into());
                }
                Some(cap) => cap,
                None => self.settings.sector_scan_cap,
            },
        };
        let aggregator = SectorAggregator {
            cache: &self.cache,
            pacer: self.pacer.as_ref(),
            key_column: &self.settings.key_column,
            category_column: &self.settings.category_column,
        };
        self.run("sector_benchmark", aggregator.run(&request)).await
    }

    // ==========================================================================
    // Cache management.
    // ==========================================================================

    pub async fn preload_year(&self, year: i32) -> Result<PreloadOutcome, EngineError> {
        let year = self.registry.validate(year)?;
        Ok(self.cache.preload_year(year).await?)
    }

    /// Preloads `years` into the cache. Invalid years are rejected up front;
    /// remote failures are reported per year.
    pub async fn preload(&self, years: &[i32]) -> Result<PreloadReport, EngineError> {
        let years = self.registry.validate_all(years)?;
        Ok(self.cache.preload(&years).await)
    }

    pub async fn evict_all(&self) {
        self.cache.evict_all().await;
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    fn resolve_limit(&self, limit: Option<usize>) -> Result<usize, CoreError> {
        bounded_limit(limit.unwrap_or(self.settings.default_limit), self.settings.max_limit)
    }

    /// Runs one query inside its own span, under the configured deadline.
    async fn run<T, F>(&self, operation: &'static str, query: F) -> Result<T, EngineError>
    where
        F: Future<Output = Result<T, EngineError>>,
    {
        let query_id = Uuid::new_v4();
        let span = tracing::info_span!("query", %query_id, operation);
        let deadline = self.settings.query_timeout_secs;

        async move {
            if deadline == 0 {
                return query.await;
            }
            match tokio::time::timeout(Duration::from_secs(deadline), query).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!(timeout_secs = deadline, "Query abandoned after its deadline.");
                    Err(EngineError::Timeout { secs: deadline })
                }
            }
        }
        .instrument(span)
        .await
    }
}

fn bounded_limit(limit: usize, max: usize) -> Result<usize, CoreError> {
    if limit == 0 || limit > max {
        return Err(CoreError::InvalidLimit { limit, max });
    }
    Ok(limit)
}
