use crate::enums::FilterValue;
use serde::{Deserialize, Serialize};

/// An equality predicate over one column plus an optional row cap.
///
/// The same shape serves point lookups (key column) and category scans
/// (grouping column).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowFilter {
    pub column: String,
    pub value: FilterValue,
    pub limit: Option<usize>,
}

impl RowFilter {
    pub fn eq(column: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}
