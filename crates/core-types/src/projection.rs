use crate::columns::YEAR_COLUMN;
use serde::{Deserialize, Serialize};

/// An ordered, duplicate-free set of column names requested by a query.
///
/// An empty projection means "every column".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnProjection {
    columns: Vec<String>,
}

impl ColumnProjection {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut projection = Self::default();
        for column in columns {
            projection.push(column);
        }
        projection
    }

    /// A projection that keeps every column of the partition.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn is_all(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Appends `column` unless it is already present.
    pub fn push(&mut self, column: impl Into<String>) {
        let column = column.into();
        if !self.contains(&column) {
            self.columns.push(column);
        }
    }

    /// Ensures the row-identifying key column is part of the output.
    ///
    /// A projection of every column already contains it.
    pub fn with_key(mut self, key_column: &str) -> Self {
        if !self.is_all() {
            self.push(key_column);
        }
        self
    }

    /// Ensures the synthetic year column is part of the output when more than
    /// one year contributes rows.
    pub fn with_year_if(mut self, multi_year: bool) -> Self {
        if multi_year && !self.is_all() {
            self.push(YEAR_COLUMN);
        }
        self
    }

    /// Splits the projection against a partition schema, returning the kept
    /// projection and the names that schema does not know.
    ///
    /// The synthetic year column is always kept.
    pub fn retain_known(&self, schema: &[String]) -> (ColumnProjection, Vec<String>) {
        let mut kept = ColumnProjection::default();
        let mut dropped = Vec::new();
        for column in &self.columns {
            if column == YEAR_COLUMN || schema.iter().any(|s| s == column) {
                kept.push(column.clone());
            } else {
                dropped.push(column.clone());
            }
        }
        (kept, dropped)
    }
}
