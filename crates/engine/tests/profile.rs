//! Revenue series and full financial profiles.

mod common;

use common::engine_over;
use engine::EngineError;
use partition_source::MemorySource;
use polars::prelude::*;
use std::sync::Arc;

fn statements_source() -> MemorySource {
    MemorySource::new()
        .with_partition(
            2022,
            df!(
                "inn" => &["7701", "7702"],
                "okved_section" => &["C", "G"],
                "line_1100" => &[3.0, 4.0],
                "line_2110" => &[100i64, 200]
            )
            .unwrap(),
        )
        .with_partition(
            2023,
            df!(
                "inn" => &["7701", "7702"],
                "line_2110" => &[Some(150.0), None],
                "line_2400" => &[12.0, -3.0]
            )
            .unwrap(),
        )
}

#[tokio::test]
async fn revenue_is_reported_per_year_in_ascending_order() {
    let engine = engine_over(Arc::new(statements_source()));

    let series = engine
        .revenue_timeseries("7701", Some(&[2024, 2023, 2022]))
        .await
        .unwrap();

    let points: Vec<(i32, Option<f64>)> = series.series.iter().map(|p| (p.year, p.revenue)).collect();
    assert_eq!(points, vec![(2022, Some(100.0)), (2023, Some(150.0))]);
    assert_eq!(series.meta.matched_rows, 2);
    // 2024 has no partition in this source.
    assert!(series.meta.year_errors.contains_key(&2024));
    assert_eq!(series.meta.per_year_elapsed_ms.len(), 3);
}

#[tokio::test]
async fn history_queries_default_to_2019_through_2023() {
    let engine = engine_over(Arc::new(statements_source()));

    let series = engine.revenue_timeseries("7701", None).await.unwrap();
    assert_eq!(series.meta.years_scanned, vec![2019, 2020, 2021, 2022, 2023]);
    assert_eq!(series.series.len(), 2);
    assert!(!series.meta.year_errors.contains_key(&2024));

    let profile = engine.financial_profile("7701", None).await.unwrap();
    assert_eq!(profile.years, vec![2019, 2020, 2021, 2022, 2023]);
    assert_eq!(profile.reference_year, 2023);
}

#[tokio::test]
async fn null_revenue_is_kept_as_a_point() {
    let engine = engine_over(Arc::new(statements_source()));

    let series = engine.revenue_timeseries("7702", Some(&[2023])).await.unwrap();

    assert_eq!(series.series.len(), 1);
    assert_eq!(series.series[0].revenue, None);
}

#[tokio::test]
async fn profile_lines_come_from_the_latest_year() {
    let engine = engine_over(Arc::new(statements_source()));

    let profile = engine
        .financial_profile("7701", Some(&[2023, 2022]))
        .await
        .unwrap();

    assert_eq!(profile.reference_year, 2023);
    assert_eq!(profile.years, vec![2022, 2023]);
    let codes: Vec<&str> = profile.indicators.iter().map(|row| row.code.as_str()).collect();
    assert_eq!(codes, vec!["line_2110", "line_2400"]);

    assert_eq!(profile.value("line_2110", 2022), Some(100.0));
    assert_eq!(profile.value("line_2110", 2023), Some(150.0));
    assert_eq!(profile.value("line_2400", 2022), None);
    assert_eq!(profile.value("line_2400", 2023), Some(12.0));
    assert!(profile.indicator("line_1100").is_none());
}

#[tokio::test]
async fn a_company_absent_from_every_year_is_not_found() {
    let engine = engine_over(Arc::new(statements_source()));

    let err = engine
        .financial_profile("0000", Some(&[2022, 2023]))
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::NotFound { ref key, .. } if key == "0000"));
}
