//! # Partition Source
//!
//! Read access to the yearly parquet partitions.
//!
//! A [`ScanPlan`] describes a read (projection, equality filter, row limit)
//! and performs no I/O; a [`PartitionSource`] executes it. Two sources are
//! provided: [`HuggingFaceSource`] reads the published dataset over HTTP, and
//! [`MemorySource`] serves frames held in memory, with call counting and
//! failure injection for tests and demos.

use async_trait::async_trait;
use core_types::{ColumnProjection, PartitionYear};
use polars::prelude::DataFrame;

mod auth;
pub mod descriptor;
pub mod error;
pub mod hub;
pub mod memory;
pub mod plan;
pub mod ranged;
pub mod responses;

// --- Public API ---
pub use descriptor::PartitionDescriptor;
pub use error::SourceError;
pub use hub::HuggingFaceSource;
pub use memory::{FailureMode, MemorySource};
pub use plan::{vstack_all, ScanPlan};
pub use ranged::{ParquetFooter, RangeRead};

/// The abstract interface to wherever the yearly partitions are stored.
///
/// The cache and the engine only talk to this trait, so the live hub client
/// and the in-memory source are interchangeable.
#[async_trait]
pub trait PartitionSource: Send + Sync {
    /// Describes where the partition for `year` lives.
    fn descriptor(&self, year: PartitionYear) -> PartitionDescriptor;

    /// Column names of the partition, including the synthetic `year` column.
    async fn schema(&self, year: PartitionYear) -> Result<Vec<String>, SourceError>;

    /// Executes a plan against the partition it names.
    async fn execute(&self, plan: &ScanPlan) -> Result<DataFrame, SourceError>;
}

/// Builds a lazy read of one year's partition.
///
/// An empty projection reads every column. Nothing is fetched until the plan is
/// handed to [`PartitionSource::execute`].
pub fn build_scan(year: PartitionYear, columns: &ColumnProjection) -> ScanPlan {
    ScanPlan::new(year, columns.clone())
}
