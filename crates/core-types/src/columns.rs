//! Well-known column names of the yearly financial statements partitions.

/// The synthetic partition column. It is not stored in the parquet files and is
/// injected as a literal when a partition is scanned.
pub const YEAR_COLUMN: &str = "year";

/// Taxpayer identification number, the row-identifying key.
pub const DEFAULT_KEY_COLUMN: &str = "inn";

/// Top-level industry classification section, the default comparison grouping.
pub const DEFAULT_CATEGORY_COLUMN: &str = "okved_section";

/// Revenue line of the income statement.
pub const REVENUE_COLUMN: &str = "line_2110";

/// Net profit line of the income statement.
pub const NET_PROFIT_COLUMN: &str = "line_2400";

/// Every reported financial indicator is stored in a column with this prefix.
pub const FINANCIAL_LINE_PREFIX: &str = "line_";

/// Fields returned by a company timeseries query when the caller names none.
pub const DEFAULT_FIELDS: &[&str] = &[
    "inn",
    "year",
    "region",
    "okved_section",
    "okved",
    "line_2110",
    "line_2300",
    "line_2400",
];

/// Metrics compared against the sector when the caller names none.
pub const DEFAULT_BENCHMARK_METRICS: &[&str] = &[REVENUE_COLUMN, NET_PROFIT_COLUMN];

pub fn default_fields() -> Vec<String> {
    DEFAULT_FIELDS.iter().map(|f| f.to_string()).collect()
}

pub fn is_financial_line(column: &str) -> bool {
    column.starts_with(FINANCIAL_LINE_PREFIX)
}
