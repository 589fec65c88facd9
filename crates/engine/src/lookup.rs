use core_types::{ColumnProjection, PartitionYear};
use partition_cache::PartitionCache;
use partition_source::SourceError;
use polars::prelude::DataFrame;

/// Result of a point lookup for one entity in one year.
#[derive(Debug, Clone)]
pub enum LookupOutcome {
    Found(DataFrame),
    /// No row matched. Not an error.
    Empty { columns: Vec<String> },
}

impl LookupOutcome {
    pub(crate) fn from_frame(frame: DataFrame) -> Self {
        if frame.height() > 0 {
            LookupOutcome::Found(frame)
        } else {
            LookupOutcome::Empty {
                columns: frame.get_column_names().iter().map(|c| c.to_string()).collect(),
            }
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, LookupOutcome::Found(_))
    }

    pub fn row_count(&self) -> usize {
        match self {
            LookupOutcome::Found(frame) => frame.height(),
            LookupOutcome::Empty { .. } => 0,
        }
    }

    /// The matched rows; a zero-row frame when nothing matched.
    pub fn into_frame(self) -> DataFrame {
        match self {
            LookupOutcome::Found(frame) => frame,
            LookupOutcome::Empty { .. } => DataFrame::empty(),
        }
    }
}

/// Rows of `year` whose key column equals `key`, at most `limit` of them.
///
/// The key column is always part of the output. Served from the cache when the
/// year is cached.
pub(crate) async fn lookup_year(
    cache: &PartitionCache,
    key_column: &str,
    year: PartitionYear,
    key: &str,
    columns: &ColumnProjection,
    limit: usize,
) -> Result<LookupOutcome, SourceError> {
    let projection = columns.clone().with_key(key_column);
    let view = cache
        .get_or_build(year, &projection)
        .await
        .filter_eq(key_column, key)
        .limit(limit);
    let cached = view.is_cached();
    let frame = view.collect().await?;

    tracing::debug!(%year, key, cached, rows = frame.height(), "Lookup finished.");
    Ok(LookupOutcome::from_frame(frame))
}
