use crate::partition::CachedPartition;
use core_types::{FilterValue, RowFilter};
use partition_source::{PartitionSource, ScanPlan, SourceError};
use polars::prelude::DataFrame;
use std::sync::Arc;

enum Backing {
    Cached(Arc<CachedPartition>),
    Remote(Arc<dyn PartitionSource>),
}

/// A lazy read over one year, served either from the cache or the remote source.
///
/// Refining the view is free; only [`PartitionView::collect`] does work, and
/// only a remote-backed view performs I/O.
pub struct PartitionView {
    plan: ScanPlan,
    backing: Backing,
}

impl PartitionView {
    pub(crate) fn cached(plan: ScanPlan, partition: Arc<CachedPartition>) -> Self {
        Self {
            plan,
            backing: Backing::Cached(partition),
        }
    }

    pub(crate) fn remote(plan: ScanPlan, source: Arc<dyn PartitionSource>) -> Self {
        Self {
            plan,
            backing: Backing::Remote(source),
        }
    }

    pub fn filter_eq(self, column: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.with_filter(RowFilter::eq(column, value))
    }

    pub fn with_filter(mut self, filter: RowFilter) -> Self {
        self.plan = self.plan.with_filter(filter);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.plan = self.plan.limit(limit);
        self
    }

    pub fn is_cached(&self) -> bool {
        matches!(self.backing, Backing::Cached(_))
    }

    pub fn plan(&self) -> &ScanPlan {
        &self.plan
    }

    /// Executes the view.
    pub async fn collect(self) -> Result<DataFrame, SourceError> {
        match self.backing {
            Backing::Cached(partition) => {
                let plan = self.plan;
                tokio::task::spawn_blocking(move || plan.execute(partition.frame().clone()))
                    .await
                    .map_err(|e| SourceError::Task(e.to_string()))?
                    .map_err(SourceError::from)
            }
            Backing::Remote(source) => source.execute(&self.plan).await,
        }
    }
}
