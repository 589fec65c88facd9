use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Year {year} is not available. Valid range: {first}-{last}")]
    InvalidYear { year: i32, first: i32, last: i32 },

    #[error("The list of years is empty")]
    EmptyYearList,

    #[error("The list of metrics is empty")]
    EmptyMetricList,

    #[error("Row limit {limit} is outside the allowed range 1-{max}")]
    InvalidLimit { limit: usize, max: usize },

    #[error("Invalid partition range: first year {first} is after last year {last}")]
    InvalidRange { first: i32, last: i32 },
}
