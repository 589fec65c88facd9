//! Integration tests for partition caching: idempotent preloads, zero remote
//! calls once cached, and safe behaviour under concurrent or abandoned loads.

use std::sync::Arc;
use std::time::Duration;

use core_types::{ColumnProjection, PartitionYear};
use futures::future::join_all;
use partition_cache::{CacheStats, PartitionCache, PreloadOutcome};
use partition_source::{FailureMode, MemorySource};
use polars::prelude::*;

fn partition_2023() -> DataFrame {
    df!(
        "inn" => &["7701", "7702", "7701", "7703"],
        "region" => &["77", "50", "77", "78"],
        "line_2110" => &[Some(10.0), Some(20.0), None, Some(40.0)]
    )
    .unwrap()
}

fn partition_2022() -> DataFrame {
    df!(
        "inn" => &["7701", "7704"],
        "line_2110" => &[5.0, 6.0]
    )
    .unwrap()
}

fn source() -> Arc<MemorySource> {
    Arc::new(
        MemorySource::new()
            .with_partition(2022, partition_2022())
            .with_partition(2023, partition_2023()),
    )
}

fn y(year: i32) -> PartitionYear {
    PartitionYear::new(year)
}

fn assert_frames_match(left: &DataFrame, right: &DataFrame) {
    assert_eq!(left.get_column_names(), right.get_column_names());
    assert_eq!(left.height(), right.height());
    for (l, r) in left.get_columns().iter().zip(right.get_columns()) {
        assert!(l.equals_missing(r), "column {} differs", l.name());
    }
}

#[tokio::test]
async fn preloading_twice_fetches_once() {
    let source = source();
    let cache = PartitionCache::new(source.clone());

    let first = cache.preload(&[y(2023)]).await;
    let second = cache.preload(&[y(2023)]).await;

    assert_eq!(first.loaded, vec![y(2023)]);
    assert_eq!(second.skipped, vec![y(2023)]);
    assert_eq!(source.execute_calls(), 1);

    let stats = cache.stats().await;
    assert_eq!(stats.cached_years, vec![2023]);
    assert_eq!(stats.count, 1);
    assert_eq!(stats.total_rows, 4);
    assert!(stats.approx_bytes > 0);
}

#[tokio::test]
async fn cached_years_are_served_without_remote_calls() {
    let source = source();
    let cache = PartitionCache::new(source.clone());
    cache.preload(&[y(2023)]).await;
    let calls_after_preload = source.total_calls();

    let view = cache
        .get_or_build(y(2023), &ColumnProjection::new(["line_2110", "inn"]))
        .await
        .filter_eq("inn", "7701")
        .limit(10);
    assert!(view.is_cached());
    let frame = view.collect().await.unwrap();
    assert_eq!(frame.height(), 2);

    let schema = cache.schema(y(2023)).await.unwrap();
    assert!(schema.contains(&"year".to_string()));

    assert_eq!(source.total_calls(), calls_after_preload);
}

#[tokio::test]
async fn cached_and_remote_reads_return_identical_rows() {
    let cached = PartitionCache::new(source());
    cached.preload(&[y(2023)]).await;
    let uncached = PartitionCache::new(source());

    let projection = ColumnProjection::new(["inn", "region", "line_2110", "year"]);
    let from_cache = cached
        .get_or_build(y(2023), &projection)
        .await
        .filter_eq("inn", "7701")
        .limit(5)
        .collect()
        .await
        .unwrap();
    let remote_view = uncached
        .get_or_build(y(2023), &projection)
        .await
        .filter_eq("inn", "7701")
        .limit(5);
    assert!(!remote_view.is_cached());
    let from_remote = remote_view.collect().await.unwrap();

    assert_frames_match(&from_cache, &from_remote);
}

#[tokio::test]
async fn a_failing_year_does_not_abort_the_preload() {
    let source = Arc::new(
        MemorySource::new()
            .with_partition(2023, partition_2023())
            .with_failure(2022, FailureMode::RateLimited),
    );
    let cache = PartitionCache::new(source);

    let report = cache.preload(&[y(2022), y(2023), y(2021)]).await;

    assert_eq!(report.loaded, vec![y(2023)]);
    let failed: Vec<PartitionYear> = report.failed.iter().map(|(year, _)| *year).collect();
    assert_eq!(failed, vec![y(2022), y(2021)]);
    assert!(report.failed[0].1.is_rate_limited());
    assert_eq!(cache.stats().await.cached_years, vec![2023]);
}

#[tokio::test]
async fn evict_all_sends_reads_back_to_the_source() {
    let source = source();
    let cache = PartitionCache::new(source.clone());
    cache.preload(&[y(2022), y(2023)]).await;
    assert_eq!(cache.stats().await.cached_years, vec![2022, 2023]);

    cache.evict_all().await;
    assert_eq!(cache.stats().await, CacheStats::default());

    let before = source.execute_calls();
    let view = cache.get_or_build(y(2022), &ColumnProjection::all()).await;
    assert!(!view.is_cached());
    view.collect().await.unwrap();
    assert_eq!(source.execute_calls(), before + 1);
}

#[tokio::test]
async fn concurrent_preloads_of_one_year_fetch_once() {
    let source = Arc::new(
        MemorySource::new()
            .with_partition(2023, partition_2023())
            .with_latency(Duration::from_millis(50)),
    );
    let cache = Arc::new(PartitionCache::new(source.clone()));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let cache = cache.clone();
            tokio::spawn(async move { cache.preload_year(PartitionYear::new(2023)).await })
        })
        .collect();

    let outcomes: Vec<PreloadOutcome> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    assert_eq!(source.execute_calls(), 1);
    assert_eq!(outcomes.iter().filter(|o| **o == PreloadOutcome::Loaded).count(), 1);
    assert_eq!(cache.stats().await.count, 1);
}

#[tokio::test]
async fn an_abandoned_load_publishes_nothing() {
    let source = Arc::new(
        MemorySource::new()
            .with_partition(2023, partition_2023())
            .with_latency(Duration::from_millis(200)),
    );
    let cache = PartitionCache::new(source);

    let abandoned =
        tokio::time::timeout(Duration::from_millis(10), cache.preload_year(y(2023))).await;
    assert!(abandoned.is_err());
    assert_eq!(cache.stats().await.count, 0);

    assert_eq!(cache.preload_year(y(2023)).await.unwrap(), PreloadOutcome::Loaded);
    assert_eq!(cache.stats().await.total_rows, 4);
}
