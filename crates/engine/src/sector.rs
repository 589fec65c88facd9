//! Sector benchmarking: how one company's metrics compare with the median of
//! its category, year by year.

use crate::error::EngineError;
use crate::lookup::{lookup_year, LookupOutcome};
use crate::pacing::Pacer;
use crate::table::{frame_to_rows, YearTimer};
use analytics::MetricSummary;
use core_types::{ColumnProjection, FilterValue, PartitionYear};
use partition_cache::PartitionCache;
use polars::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Instant;

/// Advisory attached to results when the remote source throttled some years.
pub const RATE_LIMIT_HINT: &str =
    "Some years were rate limited by the remote source. Retry with fewer years.";

/// A resolved benchmark request.
#[derive(Debug, Clone)]
pub struct AggregationRequest {
    pub key: String,
    pub years: Vec<PartitionYear>,
    pub metrics: Vec<String>,
    /// Maximum category rows scanned per year.
    pub scan_cap: usize,
}

/// The benchmark of one year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectorAggregationResult {
    pub year: i32,
    pub category: String,
    pub metrics: Vec<MetricSummary>,
    /// Rows in the capped category sample.
    pub sector_count: usize,
    /// Rows actually scanned: the smaller of the cap and the category size.
    pub sampled_rows: usize,
    /// The sample reached the cap, so the category may be larger.
    pub truncated: bool,
}

impl SectorAggregationResult {
    pub fn metric(&self, name: &str) -> Option<&MetricSummary> {
        self.metrics.iter().find(|m| m.metric == name)
    }
}

/// Why a year produced no result row without failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    EntityNotFound,
    NoCategory,
    NoComparisonData,
}

/// Terminal state of one year of an aggregation.
#[derive(Debug)]
pub enum YearOutcome {
    Aggregated(SectorAggregationResult),
    Skipped(SkipReason),
    Failed(EngineError),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SectorMeta {
    pub years_scanned: Vec<i32>,
    /// Years that produced a result row.
    pub matched_rows: usize,
    pub elapsed_ms: f64,
    pub per_year_elapsed_ms: BTreeMap<i32, f64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub skipped_years: BTreeMap<i32, SkipReason>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rate_limit_errors: Vec<i32>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub year_errors: BTreeMap<i32, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SectorReport {
    pub key: String,
    pub category_column: String,
    /// Ascending by year.
    pub results: Vec<SectorAggregationResult>,
    pub meta: SectorMeta,
}

pub(crate) struct SectorAggregator<'a> {
    pub cache: &'a PartitionCache,
    pub pacer: &'a dyn Pacer,
    pub key_column: &'a str,
    pub category_column: &'a str,
}

impl SectorAggregator<'_> {
    /// Benchmarks every requested year, one after the other.
    ///
    /// Years are isolated: a failure is recorded and the next year proceeds.
    /// Rate-limited years land in their own bucket with a retry hint. The call
    /// fails only when every year failed and none of them was rate limited.
    pub(crate) async fn run(&self, request: &AggregationRequest) -> Result<SectorReport, EngineError> {
        let mut timer = YearTimer::start();
        let mut meta = SectorMeta {
            years_scanned: request.years.iter().map(|y| y.value()).collect(),
            ..SectorMeta::default()
        };
        let mut results = Vec::new();
        let mut failures = 0;
        let mut last_error = None;

        for &year in &request.years {
            self.pacer.wait().await;
            let year_started = Instant::now();

            let outcome = match self.aggregate_year(year, request).await {
                Ok(outcome) => outcome,
                Err(e) => YearOutcome::Failed(e),
            };
            match outcome {
                YearOutcome::Aggregated(result) => results.push(result),
                YearOutcome::Skipped(reason) => {
                    tracing::debug!(%year, ?reason, "Year skipped.");
                    meta.skipped_years.insert(year.value(), reason);
                }
                YearOutcome::Failed(e) if e.is_rate_limited() => {
                    tracing::warn!(%year, error = %e, "Year rate limited by the remote source.");
                    meta.rate_limit_errors.push(year.value());
                    failures += 1;
                }
                YearOutcome::Failed(e) => {
                    tracing::warn!(%year, error = %e, "Year failed, continuing with the rest.");
                    meta.year_errors.insert(year.value(), e.to_string());
                    last_error = Some(e.to_string());
                    failures += 1;
                }
            }
            timer.record(year.value(), year_started);
        }

        if results.is_empty()
            && !request.years.is_empty()
            && failures == request.years.len()
            && meta.rate_limit_errors.is_empty()
        {
            return Err(EngineError::AllYearsFailed {
                years: meta.years_scanned,
                last_error: last_error.unwrap_or_default(),
            });
        }

        results.sort_by_key(|r| r.year);
        meta.matched_rows = results.len();
        if !meta.rate_limit_errors.is_empty() {
            meta.hint = Some(RATE_LIMIT_HINT.to_string());
        }
        let (elapsed_ms, per_year) = timer.finish();
        meta.elapsed_ms = elapsed_ms;
        meta.per_year_elapsed_ms = per_year;

        Ok(SectorReport {
            key: request.key.clone(),
            category_column: self.category_column.to_string(),
            results,
            meta,
        })
    }

    async fn aggregate_year(
        &self,
        year: PartitionYear,
        request: &AggregationRequest,
    ) -> Result<YearOutcome, EngineError> {
        let projection = ColumnProjection::new(
            std::iter::once(self.category_column.to_string()).chain(request.metrics.iter().cloned()),
        );

        // Resolve the company and its category.
        let company = match lookup_year(
            self.cache,
            self.key_column,
            year,
            &request.key,
            &projection,
            1,
        )
        .await?
        {
            LookupOutcome::Found(frame) => frame,
            LookupOutcome::Empty { .. } => return Ok(YearOutcome::Skipped(SkipReason::EntityNotFound)),
        };
        let Some(category) = category_value(&company, self.category_column)? else {
            return Ok(YearOutcome::Skipped(SkipReason::NoCategory));
        };

        // Scan the capped category sample. One row past the cap tells whether
        // the cap cut anything.
        let mut sample = self
            .cache
            .get_or_build(year, &projection)
            .await
            .filter_eq(self.category_column, category.clone())
            .limit(request.scan_cap.saturating_add(1))
            .collect()
            .await?;
        let truncated = sample.height() > request.scan_cap;
        if truncated {
            sample = sample.head(Some(request.scan_cap));
        }

        let mut metrics = Vec::with_capacity(request.metrics.len());
        for metric in &request.metrics {
            metrics.push(MetricSummary::from_sample(
                metric.as_str(),
                first_f64(&company, metric)?,
                &f64_values(&sample, metric)?,
            ));
        }
        if !metrics.iter().any(MetricSummary::has_observations) {
            return Ok(YearOutcome::Skipped(SkipReason::NoComparisonData));
        }

        let sampled_rows = sample.height();
        tracing::debug!(%year, %category, sampled_rows, "Category aggregated.");
        Ok(YearOutcome::Aggregated(SectorAggregationResult {
            year: year.value(),
            category: category.to_string(),
            metrics,
            sector_count: sampled_rows,
            sampled_rows,
            truncated,
        }))
    }
}

fn has_column(frame: &DataFrame, column: &str) -> bool {
    frame.get_column_names().contains(&column)
}

/// The first row's value of `column` as a filter value, if present and non-empty.
fn category_value(frame: &DataFrame, column: &str) -> Result<Option<FilterValue>, EngineError> {
    if frame.height() == 0 || !has_column(frame, column) {
        return Ok(None);
    }
    let rows = frame_to_rows(&frame.select([column])?.head(Some(1)))?;
    let value = rows.first().and_then(|row| row.get(column));
    Ok(match value {
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Some(FilterValue::Str(s.clone())),
        Some(serde_json::Value::Number(n)) => n.as_i64().map(FilterValue::Int),
        _ => None,
    })
}

/// The first row's value of `column` as a float. Missing columns and
/// non-numeric cells give `None`.
pub(crate) fn first_f64(frame: &DataFrame, column: &str) -> Result<Option<f64>, EngineError> {
    if frame.height() == 0 || !has_column(frame, column) {
        return Ok(None);
    }
    let values = frame.column(column)?.cast(&DataType::Float64)?;
    Ok(values.f64()?.get(0))
}

/// Every value of `column` as a float; empty when the column is missing.
fn f64_values(frame: &DataFrame, column: &str) -> Result<Vec<Option<f64>>, EngineError> {
    if !has_column(frame, column) {
        return Ok(Vec::new());
    }
    let values = frame.column(column)?.cast(&DataType::Float64)?;
    Ok(values.f64()?.into_iter().collect())
}
