//! Behaviour of the in-memory source that the cache and engine tests rely on.

use core_types::{ColumnProjection, PartitionYear};
use partition_source::{build_scan, FailureMode, MemorySource, PartitionSource, SourceError};
use polars::prelude::*;

fn source() -> MemorySource {
    MemorySource::new().with_partition(
        2023,
        df!(
            "inn" => &["7701", "7702", "7701"],
            "okved_section" => &["C", "G", "C"],
            "line_2110" => &[10.0, 20.0, 30.0]
        )
        .unwrap(),
    )
}

#[tokio::test]
async fn building_a_scan_performs_no_calls() {
    let source = source();
    let plan = build_scan(PartitionYear::new(2023), &ColumnProjection::new(["line_2110"]))
        .filter_eq("inn", "7701")
        .limit(5);
    assert_eq!(source.total_calls(), 0);

    let frame = source.execute(&plan).await.unwrap();
    assert_eq!(frame.height(), 2);
    assert_eq!(source.execute_calls(), 1);
    assert_eq!(source.calls_for(2023), 1);
}

#[tokio::test]
async fn schema_lists_physical_columns_plus_year() {
    let source = source();
    let schema = source.schema(PartitionYear::new(2023)).await.unwrap();
    assert_eq!(schema, vec!["inn", "okved_section", "line_2110", "year"]);
    assert_eq!(source.schema_calls(), 1);
}

#[tokio::test]
async fn missing_partitions_and_injected_failures_surface_as_errors() {
    let source = source().with_failure(2022, FailureMode::RateLimited);

    let err = source
        .execute(&build_scan(PartitionYear::new(2021), &ColumnProjection::all()))
        .await
        .unwrap_err();
    assert!(matches!(err, SourceError::PartitionNotFound(y) if y.value() == 2021));

    let err = source.schema(PartitionYear::new(2022)).await.unwrap_err();
    assert!(err.is_rate_limited());

    source.fail(PartitionYear::new(2023), FailureMode::Remote("boom".into()));
    let err = source
        .execute(&build_scan(PartitionYear::new(2023), &ColumnProjection::all()))
        .await
        .unwrap_err();
    assert!(matches!(err, SourceError::Remote { status: 500, .. }));

    source.recover(PartitionYear::new(2023));
    assert!(
        source
            .execute(&build_scan(PartitionYear::new(2023), &ColumnProjection::all()))
            .await
            .is_ok()
    );
}
