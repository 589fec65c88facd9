use crate::partition::CachedPartition;
use crate::stats::CacheStats;
use crate::view::PartitionView;
use core_types::{ColumnProjection, PartitionYear};
use partition_source::{build_scan, PartitionSource, ScanPlan, SourceError};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};

/// What happened to one year during a preload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreloadOutcome {
    Loaded,
    AlreadyCached,
}

/// Summary of a `preload` call. Failures never abort the remaining years.
#[derive(Debug, Default)]
pub struct PreloadReport {
    pub loaded: Vec<PartitionYear>,
    pub skipped: Vec<PartitionYear>,
    pub failed: Vec<(PartitionYear, SourceError)>,
}

/// The process-wide cache of materialized partitions.
pub struct PartitionCache {
    source: Arc<dyn PartitionSource>,
    partitions: RwLock<HashMap<PartitionYear, Arc<CachedPartition>>>,
    // One lock per year so concurrent loads of the same year run once.
    loading: Mutex<HashMap<PartitionYear, Arc<Mutex<()>>>>,
}

impl PartitionCache {
    pub fn new(source: Arc<dyn PartitionSource>) -> Self {
        Self {
            source,
            partitions: RwLock::new(HashMap::new()),
            loading: Mutex::new(HashMap::new()),
        }
    }

    pub fn source(&self) -> &Arc<dyn PartitionSource> {
        &self.source
    }

    pub async fn get(&self, year: PartitionYear) -> Option<Arc<CachedPartition>> {
        self.partitions.read().await.get(&year).cloned()
    }

    pub async fn is_cached(&self, year: PartitionYear) -> bool {
        self.partitions.read().await.contains_key(&year)
    }

    /// Returns a lazy view over `year` projected to `columns`.
    ///
    /// A cached year is served from memory; otherwise the view wraps a remote
    /// plan and the result is not cached.
    pub async fn get_or_build(&self, year: PartitionYear, columns: &ColumnProjection) -> PartitionView {
        let plan = build_scan(year, columns);
        match self.get(year).await {
            Some(partition) => PartitionView::cached(plan, partition),
            None => PartitionView::remote(plan, Arc::clone(&self.source)),
        }
    }

    /// Column names of `year`, from memory when the year is cached.
    pub async fn schema(&self, year: PartitionYear) -> Result<Vec<String>, SourceError> {
        match self.get(year).await {
            Some(partition) => Ok(partition.column_names()),
            None => self.source.schema(year).await,
        }
    }

    /// Materializes every column of `year` and publishes it, unless it is
    /// already cached.
    pub async fn preload_year(&self, year: PartitionYear) -> Result<PreloadOutcome, SourceError> {
        if self.is_cached(year).await {
            return Ok(PreloadOutcome::AlreadyCached);
        }

        let year_lock = {
            let mut loading = self.loading.lock().await;
            Arc::clone(loading.entry(year).or_default())
        };
        let _guard = year_lock.lock().await;

        // Another task may have published the year while we waited.
        if self.is_cached(year).await {
            return Ok(PreloadOutcome::AlreadyCached);
        }

        let started = Instant::now();
        let frame = self.source.execute(&ScanPlan::full(year)).await?;
        let partition = Arc::new(CachedPartition::new(year, frame));
        tracing::info!(
            %year,
            rows = partition.rows(),
            approx_bytes = partition.approx_bytes(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Partition cached."
        );
        self.partitions.write().await.insert(year, partition);
        Ok(PreloadOutcome::Loaded)
    }

    /// Preloads each year in turn. A failing year is logged and recorded in the
    /// report; the remaining years are still attempted.
    pub async fn preload(&self, years: &[PartitionYear]) -> PreloadReport {
        let mut report = PreloadReport::default();
        for &year in years {
            match self.preload_year(year).await {
                Ok(PreloadOutcome::Loaded) => report.loaded.push(year),
                Ok(PreloadOutcome::AlreadyCached) => {
                    tracing::debug!(%year, "Partition already cached, skipping.");
                    report.skipped.push(year);
                }
                Err(e) => {
                    tracing::warn!(%year, error = %e, "Failed to preload partition.");
                    report.failed.push((year, e));
                }
            }
        }
        report
    }

    pub async fn evict(&self, year: PartitionYear) -> bool {
        self.partitions.write().await.remove(&year).is_some()
    }

    /// Drops every cached partition. Views already handed out keep their data
    /// alive until they are collected.
    pub async fn evict_all(&self) {
        let evicted = {
            let mut partitions = self.partitions.write().await;
            let count = partitions.len();
            partitions.clear();
            count
        };
        tracing::info!(evicted, "Partition cache cleared.");
    }

    pub async fn stats(&self) -> CacheStats {
        let partitions = self.partitions.read().await;
        let mut cached_years: Vec<i32> = partitions.keys().map(|y| y.value()).collect();
        cached_years.sort_unstable();

        CacheStats {
            count: cached_years.len(),
            cached_years,
            approx_bytes: partitions.values().map(|p| p.approx_bytes()).sum(),
            total_rows: partitions.values().map(|p| p.rows()).sum(),
        }
    }
}
