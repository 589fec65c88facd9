use crate::error::EngineError;
use crate::lookup::{lookup_year, LookupOutcome};
use crate::merge::diagonal_concat;
use crate::sector::first_f64;
use crate::table::{round_ms, AssemblyMeta, YearTimer};
use chrono::{DateTime, Utc};
use core_types::columns::{is_financial_line, REVENUE_COLUMN, YEAR_COLUMN};
use core_types::{ColumnProjection, PartitionYear};
use partition_cache::PartitionCache;
use polars::prelude::*;
use serde::Serialize;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RevenuePoint {
    pub year: i32,
    /// Revenue as a float, `None` when the cell is null or not numeric.
    pub revenue: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RevenueSeries {
    pub key: String,
    /// One point per year with a matching row, ascending by year.
    pub series: Vec<RevenuePoint>,
    pub meta: AssemblyMeta,
}

/// One financial statement line across the requested years.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorRow {
    pub code: String,
    /// Aligned with [`FinancialProfile::years`].
    pub values: Vec<Option<f64>>,
}

/// Every financial line of one company as an indicator by year matrix.
#[derive(Debug, Clone, Serialize)]
pub struct FinancialProfile {
    pub key: String,
    /// Year whose schema defined the indicator list.
    pub reference_year: i32,
    /// Requested years, ascending.
    pub years: Vec<i32>,
    pub indicators: Vec<IndicatorRow>,
    pub generated_at: DateTime<Utc>,
    pub elapsed_ms: f64,
}

impl FinancialProfile {
    pub fn indicator(&self, code: &str) -> Option<&IndicatorRow> {
        self.indicators.iter().find(|row| row.code == code)
    }

    /// The value of `code` in `year`, if reported.
    pub fn value(&self, code: &str, year: i32) -> Option<f64> {
        let column = self.years.iter().position(|&y| y == year)?;
        self.indicator(code)?.values.get(column).copied().flatten()
    }
}

pub(crate) async fn revenue_timeseries(
    cache: &PartitionCache,
    key_column: &str,
    years: &[PartitionYear],
    key: &str,
) -> Result<RevenueSeries, EngineError> {
    let projection = ColumnProjection::new([REVENUE_COLUMN, YEAR_COLUMN]);
    let mut timer = YearTimer::start();
    let mut meta = AssemblyMeta {
        years_scanned: years.iter().map(|y| y.value()).collect(),
        ..AssemblyMeta::default()
    };
    let mut series = Vec::new();
    let mut last_error = None;

    for &year in years {
        let year_started = Instant::now();
        match lookup_year(cache, key_column, year, key, &projection, 1).await {
            Ok(LookupOutcome::Found(frame)) => series.push(RevenuePoint {
                year: year.value(),
                revenue: first_f64(&frame, REVENUE_COLUMN)?,
            }),
            Ok(LookupOutcome::Empty { .. }) => {}
            Err(e) => {
                tracing::warn!(%year, key, error = %e, "Failed to read revenue.");
                meta.year_errors.insert(year.value(), e.to_string());
                last_error = Some(e.to_string());
            }
        }
        timer.record(year.value(), year_started);
    }

    if series.is_empty() && !years.is_empty() && meta.year_errors.len() == years.len() {
        return Err(EngineError::AllYearsFailed {
            years: meta.years_scanned,
            last_error: last_error.unwrap_or_default(),
        });
    }

    series.sort_by_key(|p| p.year);
    meta.matched_rows = series.len();
    let (elapsed_ms, per_year) = timer.finish();
    meta.elapsed_ms = elapsed_ms;
    meta.per_year_elapsed_ms = per_year;

    Ok(RevenueSeries {
        key: key.to_string(),
        series,
        meta,
    })
}

/// Builds the full financial profile of `key`.
///
/// The indicator list is every `line_*` column of the latest requested year.
/// Each year is read with the subset of those lines its own schema has; a year
/// whose schema or row cannot be read is skipped.
pub(crate) async fn financial_profile(
    cache: &PartitionCache,
    key_column: &str,
    years: &[PartitionYear],
    key: &str,
) -> Result<FinancialProfile, EngineError> {
    let started = Instant::now();
    let mut sorted_years: Vec<PartitionYear> = years.to_vec();
    sorted_years.sort();
    sorted_years.dedup();
    let Some(&reference) = sorted_years.last() else {
        return Err(core_types::CoreError::EmptyYearList.into());
    };

    let mut lines: Vec<String> = cache
        .schema(reference)
        .await?
        .into_iter()
        .filter(|c| is_financial_line(c))
        .collect();
    lines.sort();

    let mut frames = Vec::new();
    for &year in years {
        let schema = match cache.schema(year).await {
            Ok(schema) => schema,
            Err(e) => {
                tracing::warn!(%year, error = %e, "Schema unavailable, skipping year.");
                continue;
            }
        };
        let projection = ColumnProjection::new(
            lines
                .iter()
                .filter(|line| schema.contains(line))
                .cloned()
                .chain(std::iter::once(YEAR_COLUMN.to_string())),
        );
        match lookup_year(cache, key_column, year, key, &projection, 1).await {
            Ok(LookupOutcome::Found(frame)) => frames.push(frame),
            Ok(LookupOutcome::Empty { .. }) => {}
            Err(e) => tracing::warn!(%year, key, error = %e, "Failed to load year for the profile."),
        }
    }

    if frames.is_empty() {
        return Err(EngineError::NotFound {
            key: key.to_string(),
            years: years.iter().map(|y| y.value()).collect(),
        });
    }

    let merged = diagonal_concat(frames)?.sort([YEAR_COLUMN], false, true)?;
    let year_values: Vec<Option<i32>> = merged
        .column(YEAR_COLUMN)?
        .cast(&DataType::Int32)?
        .i32()?
        .into_iter()
        .collect();
    let profile_years: Vec<i32> = sorted_years.iter().map(|y| y.value()).collect();

    let mut indicators = Vec::with_capacity(lines.len());
    for code in lines {
        let mut values = vec![None; profile_years.len()];
        if let Ok(column) = merged.column(&code) {
            let cells = column.cast(&DataType::Float64)?;
            for (row, cell) in cells.f64()?.into_iter().enumerate() {
                let Some(year) = year_values.get(row).copied().flatten() else {
                    continue;
                };
                if let (Some(slot), Some(value)) =
                    (profile_years.iter().position(|&y| y == year), cell)
                {
                    values[slot] = Some(value);
                }
            }
        }
        indicators.push(IndicatorRow { code, values });
    }

    Ok(FinancialProfile {
        key: key.to_string(),
        reference_year: reference.value(),
        years: profile_years,
        indicators,
        generated_at: Utc::now(),
        elapsed_ms: round_ms(started.elapsed()),
    })
}
