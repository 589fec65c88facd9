use core_types::PartitionYear;
use polars::prelude::DataFrame;
use std::time::Instant;

/// One fully materialized yearly partition, owned by the cache.
#[derive(Debug)]
pub struct CachedPartition {
    year: PartitionYear,
    frame: DataFrame,
    rows: usize,
    approx_bytes: usize,
    loaded_at: Instant,
}

impl CachedPartition {
    pub fn new(year: PartitionYear, frame: DataFrame) -> Self {
        let rows = frame.height();
        let approx_bytes = frame.estimated_size();
        Self {
            year,
            frame,
            rows,
            approx_bytes,
            loaded_at: Instant::now(),
        }
    }

    pub fn year(&self) -> PartitionYear {
        self.year
    }

    /// The full table. Cloning a frame only bumps reference counts.
    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn approx_bytes(&self) -> usize {
        self.approx_bytes
    }

    pub fn loaded_at(&self) -> Instant {
        self.loaded_at
    }

    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .iter()
            .map(|c| c.to_string())
            .collect()
    }
}
