use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalyticsError {
    #[error("Quantile must be within [0, 1], got {0}")]
    InvalidQuantile(f64),
}
