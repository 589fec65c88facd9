use crate::descriptor::PartitionDescriptor;
use crate::error::SourceError;
use crate::plan::ScanPlan;
use crate::PartitionSource;
use async_trait::async_trait;
use core_types::columns::YEAR_COLUMN;
use core_types::PartitionYear;
use polars::prelude::DataFrame;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

/// A failure the in-memory source reports for a year instead of serving it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureMode {
    RateLimited,
    NotFound,
    Remote(String),
}

impl FailureMode {
    fn to_error(&self, year: PartitionYear) -> SourceError {
        match self {
            FailureMode::RateLimited => SourceError::RateLimited {
                retry_after_secs: None,
            },
            FailureMode::NotFound => SourceError::PartitionNotFound(year),
            FailureMode::Remote(message) => SourceError::Remote {
                status: 500,
                message: message.clone(),
            },
        }
    }
}

/// A partition source backed by frames held in memory.
///
/// It executes plans with exactly the semantics of the remote source and counts
/// every call, which makes cache behaviour observable.
#[derive(Default)]
pub struct MemorySource {
    partitions: RwLock<HashMap<PartitionYear, DataFrame>>,
    failures: RwLock<HashMap<PartitionYear, FailureMode>>,
    latency: Option<Duration>,
    execute_calls: AtomicUsize,
    schema_calls: AtomicUsize,
    calls_by_year: RwLock<HashMap<PartitionYear, usize>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) the partition for `year`. The frame must not carry a
    /// `year` column; it is injected on read like in the real dataset.
    pub fn with_partition(self, year: i32, frame: DataFrame) -> Self {
        self.insert(PartitionYear::new(year), frame);
        self
    }

    /// Makes every call for `year` fail with `mode`.
    pub fn with_failure(self, year: i32, mode: FailureMode) -> Self {
        self.fail(PartitionYear::new(year), mode);
        self
    }

    /// Delays every execution, simulating network time.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn insert(&self, year: PartitionYear, frame: DataFrame) {
        self.partitions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(year, frame);
    }

    pub fn fail(&self, year: PartitionYear, mode: FailureMode) {
        self.failures
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(year, mode);
    }

    pub fn recover(&self, year: PartitionYear) {
        self.failures
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&year);
    }

    /// Number of plan executions served so far.
    pub fn execute_calls(&self) -> usize {
        self.execute_calls.load(Ordering::SeqCst)
    }

    /// Number of schema lookups served so far.
    pub fn schema_calls(&self) -> usize {
        self.schema_calls.load(Ordering::SeqCst)
    }

    /// Executions plus schema lookups, the total number of "remote" calls.
    pub fn total_calls(&self) -> usize {
        self.execute_calls() + self.schema_calls()
    }

    pub fn calls_for(&self, year: i32) -> usize {
        self.calls_by_year
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&PartitionYear::new(year))
            .copied()
            .unwrap_or(0)
    }

    fn record_call(&self, year: PartitionYear) {
        *self
            .calls_by_year
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(year)
            .or_insert(0) += 1;
    }

    fn check_failure(&self, year: PartitionYear) -> Result<(), SourceError> {
        match self
            .failures
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&year)
        {
            Some(mode) => Err(mode.to_error(year)),
            None => Ok(()),
        }
    }

    fn partition(&self, year: PartitionYear) -> Result<DataFrame, SourceError> {
        self.partitions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&year)
            .cloned()
            .ok_or(SourceError::PartitionNotFound(year))
    }
}

#[async_trait]
impl PartitionSource for MemorySource {
    fn descriptor(&self, year: PartitionYear) -> PartitionDescriptor {
        PartitionDescriptor::new(year, format!("memory://{YEAR_COLUMN}={year}"), None)
    }

    async fn schema(&self, year: PartitionYear) -> Result<Vec<String>, SourceError> {
        self.schema_calls.fetch_add(1, Ordering::SeqCst);
        self.record_call(year);
        self.check_failure(year)?;

        let frame = self.partition(year)?;
        let mut columns: Vec<String> = frame
            .get_column_names()
            .iter()
            .map(|c| c.to_string())
            .collect();
        if !columns.iter().any(|c| c == YEAR_COLUMN) {
            columns.push(YEAR_COLUMN.to_string());
        }
        Ok(columns)
    }

    async fn execute(&self, plan: &ScanPlan) -> Result<DataFrame, SourceError> {
        let year = plan.year();
        self.execute_calls.fetch_add(1, Ordering::SeqCst);
        self.record_call(year);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.check_failure(year)?;

        let frame = self.partition(year)?;
        Ok(plan.execute(frame)?)
    }
}
