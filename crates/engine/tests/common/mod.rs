//! Shared fixtures for the engine integration tests.
#![allow(dead_code)]

use configuration::EngineConfig;
use core_types::PartitionRegistry;
use engine::{DataEngine, NoPacing};
use partition_cache::PartitionCache;
use partition_source::MemorySource;
use polars::prelude::*;
use std::sync::Arc;

/// An engine over `source` with a fresh cache and no pacing.
pub fn engine_over(source: Arc<MemorySource>) -> DataEngine {
    engine_with(source, EngineConfig::default()).with_pacer(Arc::new(NoPacing))
}

/// An engine over `source` with custom settings and their pacing.
pub fn engine_with(source: Arc<MemorySource>, settings: EngineConfig) -> DataEngine {
    let cache = Arc::new(PartitionCache::new(source));
    DataEngine::new(PartitionRegistry::default(), cache, settings)
}

pub fn years_of(frame: &DataFrame) -> Vec<i32> {
    frame
        .column("year")
        .unwrap()
        .i32()
        .unwrap()
        .into_iter()
        .map(|y| y.unwrap())
        .collect()
}

pub fn floats_of(frame: &DataFrame, column: &str) -> Vec<Option<f64>> {
    frame
        .column(column)
        .unwrap()
        .cast(&DataType::Float64)
        .unwrap()
        .f64()
        .unwrap()
        .into_iter()
        .collect()
}

/// The sector fixture: company "123" sits in category C in both years.
///
/// 2022 has three C members with revenue 5, 10 and 15. In 2023 the company's
/// own row is the only C member and it reports no figures.
pub fn sector_source() -> MemorySource {
    MemorySource::new()
        .with_partition(
            2022,
            df!(
                "inn" => &["123", "200", "300", "400"],
                "okved_section" => &["C", "C", "C", "G"],
                "line_2110" => &[5.0, 10.0, 15.0, 99.0],
                "line_2400" => &[Some(1.0), None, Some(3.0), Some(4.0)]
            )
            .unwrap(),
        )
        .with_partition(
            2023,
            df!(
                "inn" => &["123", "500"],
                "okved_section" => &["C", "G"],
                "line_2110" => &[None, Some(7.0)],
                "line_2400" => &[None, Some(2.0)]
            )
            .unwrap(),
        )
}
