use crate::error::EngineError;
use crate::lookup::{lookup_year, LookupOutcome};
use crate::merge::diagonal_concat;
use crate::table::{AssembledTable, AssemblyMeta, YearTimer};
use core_types::columns::YEAR_COLUMN;
use core_types::{ColumnProjection, PartitionYear};
use partition_cache::PartitionCache;
use polars::prelude::DataFrame;
use std::time::Instant;

/// Collects one entity's rows across `years` into a single table.
///
/// The first year's schema is the reference: requested columns it lacks are
/// dropped from the projection and reported. Each year is read in the given
/// order and in isolation; a failing year is recorded and skipped. Frames are
/// merged diagonally, sorted by year and cut to `limit` rows after the merge,
/// so an early year can use up the whole limit.
pub(crate) async fn assemble(
    cache: &PartitionCache,
    key_column: &str,
    years: &[PartitionYear],
    key: &str,
    requested: &ColumnProjection,
    limit: usize,
) -> Result<AssembledTable, EngineError> {
    let mut timer = YearTimer::start();
    let multi_year = years.len() > 1;

    let mut projection = requested.clone().with_year_if(multi_year);
    let mut dropped_fields = Vec::new();
    if let Some(&reference) = years.first() {
        if !projection.is_all() {
            match cache.schema(reference).await {
                Ok(schema) => {
                    let (kept, dropped) = projection.retain_known(&schema);
                    if !dropped.is_empty() {
                        tracing::info!(year = %reference, ?dropped, "Dropping fields absent from the reference year.");
                    }
                    projection = kept;
                    dropped_fields = dropped;
                }
                Err(e) => {
                    tracing::warn!(year = %reference, error = %e, "Reference schema unavailable, keeping every requested field.");
                }
            }
        }
    }
    let projection = projection.with_key(key_column);

    let mut frames: Vec<DataFrame> = Vec::new();
    let mut meta = AssemblyMeta {
        years_scanned: years.iter().map(|y| y.value()).collect(),
        dropped_fields,
        ..AssemblyMeta::default()
    };
    let mut last_error = None;

    for &year in years {
        let year_started = Instant::now();
        match lookup_year(cache, key_column, year, key, &projection, limit).await {
            Ok(LookupOutcome::Found(frame)) => frames.push(frame),
            Ok(LookupOutcome::Empty { .. }) => {
                tracing::debug!(%year, key, "No rows for this year.");
            }
            Err(e) => {
                tracing::warn!(%year, key, error = %e, "Year failed, continuing with the rest.");
                meta.year_errors.insert(year.value(), e.to_string());
                last_error = Some(e.to_string());
            }
        }
        timer.record(year.value(), year_started);
    }

    if frames.is_empty() && !years.is_empty() && meta.year_errors.len() == years.len() {
        return Err(EngineError::AllYearsFailed {
            years: meta.years_scanned,
            last_error: last_error.unwrap_or_default(),
        });
    }

    let mut merged = diagonal_concat(frames)?;
    if merged.get_column_names().contains(&YEAR_COLUMN) {
        merged = merged.sort([YEAR_COLUMN], false, true)?;
    }
    let merged = merged.head(Some(limit));

    meta.matched_rows = merged.height();
    let (elapsed_ms, per_year) = timer.finish();
    meta.elapsed_ms = elapsed_ms;
    meta.per_year_elapsed_ms = per_year;

    tracing::info!(key, matched_rows = meta.matched_rows, elapsed_ms, "Assembly finished.");
    Ok(AssembledTable::new(merged, projection.columns().to_vec(), meta))
}
