use crate::error::EngineError;
use polars::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// One result row as a JSON object keyed by column name.
pub type JsonRow = serde_json::Map<String, serde_json::Value>;

/// Converts a frame into row objects. Nulls become JSON `null`.
pub fn frame_to_rows(frame: &DataFrame) -> Result<Vec<JsonRow>, EngineError> {
    if frame.height() == 0 || frame.width() == 0 {
        return Ok(Vec::new());
    }
    let mut buffer = Vec::new();
    let mut frame = frame.clone();
    JsonWriter::new(&mut buffer)
        .with_json_format(JsonFormat::Json)
        .finish(&mut frame)?;
    Ok(serde_json::from_slice(&buffer)?)
}

pub(crate) fn round_ms(elapsed: Duration) -> f64 {
    (elapsed.as_secs_f64() * 1000.0 * 100.0).round() / 100.0
}

/// Per-year and total wall time of a multi-year operation.
pub(crate) struct YearTimer {
    started: Instant,
    per_year: BTreeMap<i32, f64>,
}

impl YearTimer {
    pub(crate) fn start() -> Self {
        Self {
            started: Instant::now(),
            per_year: BTreeMap::new(),
        }
    }

    pub(crate) fn record(&mut self, year: i32, year_started: Instant) {
        self.per_year.insert(year, round_ms(year_started.elapsed()));
    }

    pub(crate) fn finish(self) -> (f64, BTreeMap<i32, f64>) {
        (round_ms(self.started.elapsed()), self.per_year)
    }
}

/// Metadata attached to every multi-year table.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AssemblyMeta {
    pub years_scanned: Vec<i32>,
    pub matched_rows: usize,
    pub elapsed_ms: f64,
    /// Recorded for every scanned year, including failed and empty ones.
    pub per_year_elapsed_ms: BTreeMap<i32, f64>,
    /// Requested columns missing from the reference year's schema.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dropped_fields: Vec<String>,
    /// Years whose read failed, with the failure message.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub year_errors: BTreeMap<i32, String>,
}

/// A multi-year result table.
///
/// Every row carries the same column set; cells a year did not provide are
/// null. Rows are ascending by year whenever the year column is present.
#[derive(Debug, Clone)]
pub struct AssembledTable {
    columns: Vec<String>,
    frame: DataFrame,
    meta: AssemblyMeta,
}

impl AssembledTable {
    pub(crate) fn new(frame: DataFrame, fallback_columns: Vec<String>, meta: AssemblyMeta) -> Self {
        let columns = if frame.width() > 0 {
            frame.get_column_names().iter().map(|c| c.to_string()).collect()
        } else {
            fallback_columns
        };
        Self {
            columns,
            frame,
            meta,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn into_frame(self) -> DataFrame {
        self.frame
    }

    pub fn meta(&self) -> &AssemblyMeta {
        &self.meta
    }

    pub fn row_count(&self) -> usize {
        self.frame.height()
    }

    pub fn rows(&self) -> Result<Vec<JsonRow>, EngineError> {
        frame_to_rows(&self.frame)
    }

    /// The serializable form: columns, row objects and metadata.
    pub fn to_output(&self) -> Result<TableOutput, EngineError> {
        Ok(TableOutput {
            columns: self.columns.clone(),
            rows: self.rows()?,
            meta: self.meta.clone(),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TableOutput {
    pub columns: Vec<String>,
    pub rows: Vec<JsonRow>,
    pub meta: AssemblyMeta,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_keep_nulls_and_types() {
        let frame = df!(
            "inn" => &["7701", "7702"],
            "line_2110" => &[Some(12.5), None],
            "year" => &[2022i32, 2023]
        )
        .unwrap();

        let rows = frame_to_rows(&frame).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["inn"], serde_json::json!("7701"));
        assert_eq!(rows[0]["line_2110"], serde_json::json!(12.5));
        assert!(rows[1]["line_2110"].is_null());
        assert_eq!(rows[1]["year"], serde_json::json!(2023));
    }

    #[test]
    fn empty_frames_have_no_rows() {
        assert!(frame_to_rows(&DataFrame::empty()).unwrap().is_empty());
        let table = AssembledTable::new(
            DataFrame::empty(),
            vec!["inn".to_string(), "year".to_string()],
            AssemblyMeta::default(),
        );
        assert_eq!(table.columns(), ["inn", "year"]);
        assert_eq!(table.row_count(), 0);
    }

    #[test]
    fn elapsed_is_rounded_to_two_decimals() {
        assert_eq!(round_ms(Duration::from_micros(12_346)), 12.35);
    }
}
