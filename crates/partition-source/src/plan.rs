use core_types::columns::YEAR_COLUMN;
use core_types::{ColumnProjection, FilterValue, PartitionYear, RowFilter};
use polars::prelude::*;

/// A lazy description of a read against one yearly partition.
///
/// Building and refining a plan never touches storage. Execution order is
/// fixed: inject the year literal, apply the equality filter, project, then
/// cap the row count.
///
/// Projection is lenient: requested columns that a partition does not have are
/// skipped rather than failing the read, so yearly partitions with drifting
/// schemas can still be queried with one column list.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanPlan {
    year: PartitionYear,
    projection: ColumnProjection,
    filter: Option<RowFilter>,
    limit: Option<usize>,
}

impl ScanPlan {
    pub fn new(year: PartitionYear, projection: ColumnProjection) -> Self {
        Self {
            year,
            projection,
            filter: None,
            limit: None,
        }
    }

    /// A plan that materializes the whole partition.
    pub fn full(year: PartitionYear) -> Self {
        Self::new(year, ColumnProjection::all())
    }

    /// Restricts the plan to rows where `column == value`.
    pub fn filter_eq(self, column: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.with_filter(RowFilter::eq(column, value))
    }

    /// Applies a row filter; its limit, when set, tightens the plan's limit.
    pub fn with_filter(mut self, filter: RowFilter) -> Self {
        if let Some(limit) = filter.limit {
            self = self.limit(limit);
        }
        self.filter = Some(filter);
        self
    }

    /// Caps the number of returned rows. Repeated calls keep the smallest cap.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(self.limit.map_or(limit, |current| current.min(limit)));
        self
    }

    pub fn year(&self) -> PartitionYear {
        self.year
    }

    pub fn projection(&self) -> &ColumnProjection {
        &self.projection
    }

    pub fn filter(&self) -> Option<&RowFilter> {
        self.filter.as_ref()
    }

    pub fn row_limit(&self) -> Option<usize> {
        self.limit
    }

    /// The physical columns a storage reader has to decode for this plan, given
    /// the columns a file actually holds. `None` means every column.
    pub fn storage_columns(&self, available: &[String]) -> Option<Vec<String>> {
        if self.projection.is_all() {
            return None;
        }
        let mut wanted: Vec<&str> = self.projection.columns().iter().map(String::as_str).collect();
        if let Some(filter) = &self.filter {
            wanted.push(&filter.column);
        }

        let mut columns = Vec::new();
        for column in available {
            if column != YEAR_COLUMN && wanted.contains(&column.as_str()) {
                columns.push(column.clone());
            }
        }
        Some(columns)
    }

    /// Runs the plan over a materialized frame of this plan's partition.
    pub fn execute(&self, frame: DataFrame) -> PolarsResult<DataFrame> {
        let available: Vec<String> = frame
            .get_column_names()
            .iter()
            .map(|c| c.to_string())
            .collect();

        let mut lazy = frame
            .lazy()
            .with_column(lit(self.year.value()).alias(YEAR_COLUMN));

        if let Some(filter) = &self.filter {
            lazy = lazy.filter(equality_expr(filter));
        }

        if !self.projection.is_all() {
            let selected: Vec<Expr> = self
                .projection
                .columns()
                .iter()
                .filter(|c| c.as_str() == YEAR_COLUMN || available.contains(c))
                .map(|c| col(c))
                .collect();
            lazy = lazy.select(selected);
        }

        if let Some(limit) = self.limit {
            lazy = lazy.limit(IdxSize::try_from(limit).unwrap_or(IdxSize::MAX));
        }

        lazy.collect()
    }
}

fn equality_expr(filter: &RowFilter) -> Expr {
    match &filter.value {
        FilterValue::Str(value) => col(&filter.column).eq(lit(value.as_str())),
        FilterValue::Int(value) => col(&filter.column).eq(lit(*value)),
    }
}

/// Stacks frames that share a schema, such as the files of one partition.
pub fn vstack_all(frames: Vec<DataFrame>) -> PolarsResult<DataFrame> {
    let mut frames = frames.into_iter();
    let Some(mut combined) = frames.next() else {
        return Ok(DataFrame::empty());
    };
    for frame in frames {
        combined.vstack_mut(&frame)?;
    }
    combined.align_chunks();
    Ok(combined)
}
