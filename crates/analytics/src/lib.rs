//! # RFSD Analytics
//!
//! Pure statistics used by sector benchmarking. Nothing here touches a
//! partition or the network: callers hand in plain observations and get
//! summaries back.
//!
//! ## Public API
//!
//! - `nearest_rank_quantile` / `nearest_rank_median`: quantiles that always
//!   return an observed value instead of interpolating between two.
//! - `MetricSummary`: one metric's company value against its sector median.
//! - `AnalyticsError`: the error type for this crate.

pub mod error;
pub mod quantile;
pub mod summary;

pub use error::AnalyticsError;
pub use quantile::{nearest_rank_median, nearest_rank_quantile};
pub use summary::MetricSummary;
