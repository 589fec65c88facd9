//! Sector benchmarking: nearest-rank medians, year isolation, rate-limit
//! bucketing and pacing.

mod common;

use common::{engine_over, engine_with, sector_source};
use configuration::EngineConfig;
use core_types::CoreError;
use engine::{BenchmarkQuery, EngineError, SkipReason, RATE_LIMIT_HINT};
use partition_source::{FailureMode, MemorySource};
use polars::prelude::*;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn company_is_compared_with_its_category() {
    let engine = engine_over(Arc::new(sector_source()));
    let query = BenchmarkQuery::new("123").years([2022, 2023]).metrics(["line_2110"]);

    let report = engine.sector_benchmark(&query).await.unwrap();

    assert_eq!(report.results.len(), 1);
    let result = &report.results[0];
    assert_eq!(result.year, 2022);
    assert_eq!(result.category, "C");
    assert_eq!(result.sector_count, 3);
    assert_eq!(result.sampled_rows, 3);
    assert!(!result.truncated);

    let revenue = result.metric("line_2110").unwrap();
    assert_eq!(revenue.company_value, Some(5.0));
    assert_eq!(revenue.sector_median, Some(10.0));

    assert_eq!(
        report.meta.skipped_years.get(&2023),
        Some(&SkipReason::NoComparisonData)
    );
    assert!(report.meta.year_errors.is_empty());
    assert!(report.meta.rate_limit_errors.is_empty());
    assert_eq!(report.meta.hint, None);
    assert_eq!(report.meta.per_year_elapsed_ms.len(), 2);
}

#[tokio::test]
async fn null_metric_values_are_left_out_of_the_median() {
    let engine = engine_over(Arc::new(sector_source()));
    let query = BenchmarkQuery::new("123").years([2022]);

    let report = engine.sector_benchmark(&query).await.unwrap();

    let profit = report.results[0].metric("line_2400").unwrap();
    assert_eq!(profit.observations, 2);
    assert_eq!(profit.sector_median, Some(3.0));
}

#[tokio::test]
async fn even_samples_use_an_observed_median() {
    let source = MemorySource::new().with_partition(
        2021,
        df!(
            "inn" => &["a", "b", "c", "d"],
            "okved_section" => &["F", "F", "F", "F"],
            "line_2110" => &[40.0, 10.0, 30.0, 20.0]
        )
        .unwrap(),
    );
    let engine = engine_over(Arc::new(source));
    let query = BenchmarkQuery::new("a").years([2021]).metrics(["line_2110"]);

    let report = engine.sector_benchmark(&query).await.unwrap();

    let median = report.results[0].metric("line_2110").unwrap().sector_median.unwrap();
    assert!(median == 20.0 || median == 30.0);
    assert_ne!(median, 25.0);
}

#[tokio::test]
async fn the_scan_cap_bounds_the_sample() {
    let source = MemorySource::new().with_partition(
        2021,
        df!(
            "inn" => &["a", "b", "c", "d", "e"],
            "okved_section" => &["F"; 5],
            "line_2110" => &[1.0, 2.0, 3.0, 4.0, 5.0]
        )
        .unwrap(),
    );
    let engine = engine_over(Arc::new(source));
    let query = BenchmarkQuery::new("a").years([2021]).metrics(["line_2110"]).scan_cap(2);

    let report = engine.sector_benchmark(&query).await.unwrap();

    let result = &report.results[0];
    assert_eq!(result.sampled_rows, 2);
    assert!(result.truncated);
    assert_eq!(result.metric("line_2110").unwrap().observations, 2);
}

#[tokio::test]
async fn a_category_exactly_at_the_cap_is_not_truncated() {
    let source = MemorySource::new().with_partition(
        2021,
        df!(
            "inn" => &["a", "b", "c"],
            "okved_section" => &["F"; 3],
            "line_2110" => &[1.0, 2.0, 3.0]
        )
        .unwrap(),
    );
    let engine = engine_over(Arc::new(source));
    let query = BenchmarkQuery::new("a").years([2021]).metrics(["line_2110"]).scan_cap(3);

    let report = engine.sector_benchmark(&query).await.unwrap();

    let result = &report.results[0];
    assert_eq!(result.sampled_rows, 3);
    assert!(!result.truncated);
    assert_eq!(result.metric("line_2110").unwrap().observations, 3);
}

#[tokio::test]
async fn a_failing_year_is_isolated() {
    let source = sector_source()
        .with_partition(
            2021,
            df!("inn" => &["123"], "okved_section" => &["C"], "line_2110" => &[1.0]).unwrap(),
        )
        .with_failure(2021, FailureMode::Remote("boom".into()));
    let engine = engine_over(Arc::new(source));
    let query = BenchmarkQuery::new("123").years([2021, 2022]).metrics(["line_2110"]);

    let report = engine.sector_benchmark(&query).await.unwrap();

    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].year, 2022);
    assert!(report.meta.year_errors.contains_key(&2021));
    let timed: Vec<i32> = report.meta.per_year_elapsed_ms.keys().copied().collect();
    assert_eq!(timed, vec![2021, 2022]);
}

#[tokio::test]
async fn rate_limited_years_get_their_own_bucket() {
    let source = sector_source().with_failure(2023, FailureMode::RateLimited);
    let engine = engine_over(Arc::new(source));
    let query = BenchmarkQuery::new("123").years([2023, 2022]).metrics(["line_2110"]);

    let report = engine.sector_benchmark(&query).await.unwrap();

    assert_eq!(report.results.len(), 1);
    assert_eq!(report.meta.rate_limit_errors, vec![2023]);
    assert!(report.meta.year_errors.is_empty());
    assert_eq!(report.meta.hint.as_deref(), Some(RATE_LIMIT_HINT));
}

#[tokio::test]
async fn only_rate_limited_years_still_return_a_report() {
    let source = MemorySource::new()
        .with_failure(2022, FailureMode::RateLimited)
        .with_failure(2023, FailureMode::RateLimited);
    let engine = engine_over(Arc::new(source));
    let query = BenchmarkQuery::new("123").years([2022, 2023]);

    let report = engine.sector_benchmark(&query).await.unwrap();

    assert!(report.results.is_empty());
    assert_eq!(report.meta.rate_limit_errors, vec![2022, 2023]);
    assert!(report.meta.hint.is_some());
}

#[tokio::test]
async fn every_year_failing_is_a_hard_failure() {
    let source = MemorySource::new().with_failure(2022, FailureMode::Remote("down".into()));
    let engine = engine_over(Arc::new(source));
    let query = BenchmarkQuery::new("123").years([2022]);

    let err = engine.sector_benchmark(&query).await.unwrap_err();

    assert!(matches!(err, EngineError::AllYearsFailed { .. }));
}

#[tokio::test]
async fn unknown_companies_are_skipped_without_error() {
    let engine = engine_over(Arc::new(sector_source()));
    let query = BenchmarkQuery::new("999").years([2022, 2023]);

    let report = engine.sector_benchmark(&query).await.unwrap();

    assert!(report.results.is_empty());
    assert_eq!(report.meta.skipped_years.get(&2022), Some(&SkipReason::EntityNotFound));
}

#[tokio::test]
async fn a_zero_scan_cap_is_rejected() {
    let engine = engine_over(Arc::new(sector_source()));
    let query = BenchmarkQuery::new("123").years([2022]).scan_cap(0);

    assert!(matches!(
        engine.sector_benchmark(&query).await,
        Err(EngineError::Core(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn consecutive_years_are_paced() {
    let settings = EngineConfig {
        pacing_interval_ms: 500,
        ..EngineConfig::default()
    };
    let source = sector_source().with_partition(
        2024,
        df!("inn" => &["123"], "okved_section" => &["C"], "line_2110" => &[1.0]).unwrap(),
    );
    let engine = engine_with(Arc::new(source), settings);
    let query = BenchmarkQuery::new("123").years([2022, 2023, 2024]).metrics(["line_2110"]);

    let started = tokio::time::Instant::now();
    let report = engine.sector_benchmark(&query).await.unwrap();

    assert!(started.elapsed() >= Duration::from_millis(1000));
    assert_eq!(report.results.len(), 2);
}

#[tokio::test]
async fn an_empty_metric_list_is_rejected_before_any_read() {
    let source = Arc::new(sector_source());
    let engine = engine_over(Arc::clone(&source));
    let query = BenchmarkQuery::new("123").years([2022]).metrics(Vec::<String>::new());

    let err = engine.sector_benchmark(&query).await.unwrap_err();

    assert!(matches!(err, EngineError::Core(CoreError::EmptyMetricList)));
    assert_eq!(source.total_calls(), 0);
}
