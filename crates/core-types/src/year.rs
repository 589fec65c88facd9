use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// First reporting year published in the dataset.
pub const FIRST_AVAILABLE_YEAR: i32 = 2011;
/// Last reporting year published in the dataset.
pub const LAST_AVAILABLE_YEAR: i32 = 2024;
/// Years scanned by multi-year queries that name none.
pub const DEFAULT_QUERY_YEARS: &[i32] = &[2022, 2023, 2024];
/// Years covered by revenue series and financial profiles that name none.
pub const DEFAULT_HISTORY_YEARS: &[i32] = &[2019, 2020, 2021, 2022, 2023];

/// Identifies one yearly partition.
///
/// Values that reach the cache or the remote source have been checked by a
/// [`PartitionRegistry`]; constructing one directly skips that check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartitionYear(i32);

impl PartitionYear {
    pub const fn new(year: i32) -> Self {
        Self(year)
    }

    pub const fn value(self) -> i32 {
        self.0
    }
}

impl fmt::Display for PartitionYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<PartitionYear> for i32 {
    fn from(year: PartitionYear) -> Self {
        year.0
    }
}

/// The fixed, contiguous range of yearly partitions known at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionRegistry {
    first: i32,
    last: i32,
}

impl PartitionRegistry {
    pub fn new(first: i32, last: i32) -> Result<Self, CoreError> {
        if first > last {
            return Err(CoreError::InvalidRange { first, last });
        }
        Ok(Self { first, last })
    }

    pub fn first(&self) -> PartitionYear {
        PartitionYear(self.first)
    }

    pub fn last(&self) -> PartitionYear {
        PartitionYear(self.last)
    }

    /// Every available year, ascending.
    pub fn list_years(&self) -> Vec<PartitionYear> {
        (self.first..=self.last).map(PartitionYear).collect()
    }

    pub fn contains(&self, year: i32) -> bool {
        (self.first..=self.last).contains(&year)
    }

    pub fn validate(&self, year: i32) -> Result<PartitionYear, CoreError> {
        if self.contains(year) {
            Ok(PartitionYear(year))
        } else {
            Err(CoreError::InvalidYear {
                year,
                first: self.first,
                last: self.last,
            })
        }
    }

    /// Validates a caller-supplied year list, keeping the caller's order.
    ///
    /// Fails on the first invalid year or when the list is empty.
    pub fn validate_all(&self, years: &[i32]) -> Result<Vec<PartitionYear>, CoreError> {
        if years.is_empty() {
            return Err(CoreError::EmptyYearList);
        }
        years.iter().map(|&y| self.validate(y)).collect()
    }
}

impl Default for PartitionRegistry {
    fn default() -> Self {
        Self {
            first: FIRST_AVAILABLE_YEAR,
            last: LAST_AVAILABLE_YEAR,
        }
    }
}
