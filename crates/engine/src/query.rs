use core_types::columns::{default_fields, DEFAULT_BENCHMARK_METRICS};
use core_types::year::DEFAULT_QUERY_YEARS;
use serde::Deserialize;

/// A company timeseries request. Unset fields take the engine defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TimeseriesQuery {
    pub key: String,
    pub years: Option<Vec<i32>>,
    pub fields: Option<Vec<String>>,
    pub limit: Option<usize>,
}

impl TimeseriesQuery {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    pub fn years(mut self, years: impl Into<Vec<i32>>) -> Self {
        self.years = Some(years.into());
        self
    }

    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub(crate) fn resolved_years(&self) -> Vec<i32> {
        self.years.clone().unwrap_or_else(|| DEFAULT_QUERY_YEARS.to_vec())
    }

    pub(crate) fn resolved_fields(&self) -> Vec<String> {
        self.fields.clone().unwrap_or_else(default_fields)
    }
}

/// A sector benchmark request. Unset fields take the engine defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BenchmarkQuery {
    pub key: String,
    pub years: Option<Vec<i32>>,
    pub metrics: Option<Vec<String>>,
    /// Per-year cap on scanned category rows.
    pub scan_cap: Option<usize>,
}

impl BenchmarkQuery {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    pub fn years(mut self, years: impl Into<Vec<i32>>) -> Self {
        self.years = Some(years.into());
        self
    }

    pub fn metrics<I, S>(mut self, metrics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.metrics = Some(metrics.into_iter().map(Into::into).collect());
        self
    }

    pub fn scan_cap(mut self, cap: usize) -> Self {
        self.scan_cap = Some(cap);
        self
    }

    pub(crate) fn resolved_years(&self) -> Vec<i32> {
        self.years.clone().unwrap_or_else(|| DEFAULT_QUERY_YEARS.to_vec())
    }

    pub(crate) fn resolved_metrics(&self) -> Vec<String> {
        self.metrics.clone().unwrap_or_else(|| {
            DEFAULT_BENCHMARK_METRICS.iter().map(|m| m.to_string()).collect()
        })
    }
}
