use crate::quantile::nearest_rank_median;
use serde::Serialize;

/// One metric of a benchmarked company next to its sector's median.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSummary {
    pub metric: String,
    pub company_value: Option<f64>,
    pub sector_median: Option<f64>,
    /// Non-null sector observations the median was computed from.
    pub observations: usize,
}

impl MetricSummary {
    /// Summarizes `sample`, skipping null observations.
    pub fn from_sample(
        metric: impl Into<String>,
        company_value: Option<f64>,
        sample: &[Option<f64>],
    ) -> Self {
        let observed: Vec<f64> = sample.iter().flatten().copied().collect();
        Self {
            metric: metric.into(),
            company_value,
            sector_median: nearest_rank_median(&observed),
            observations: observed.len(),
        }
    }

    pub fn has_observations(&self) -> bool {
        self.observations > 0
    }
}
