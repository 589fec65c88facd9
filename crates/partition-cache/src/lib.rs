//! # Partition Cache
//!
//! The process-wide store of fully materialized yearly partitions.
//!
//! ## Architectural Principles
//!
//! - **Owned, not global:** a `PartitionCache` is constructed at startup and
//!   handed to every component as an `Arc`. Dropping the last handle tears it
//!   down.
//! - **Atomic per year:** a partition is fully built before it is published, so
//!   readers never observe a partial year and an abandoned load leaves no trace.
//! - **Single-flight loads:** concurrent preloads of the same year wait for one
//!   fetch instead of duplicating it.
//!
//! ## Public API
//!
//! - `PartitionCache`: get_or_build / preload / evict / stats.
//! - `PartitionView`: a lazy, cache-or-remote read that executes on `collect`.
//! - `CachedPartition`, `CacheStats`, `PreloadReport`.

pub mod cache;
pub mod partition;
pub mod stats;
pub mod view;

pub use cache::{PartitionCache, PreloadOutcome, PreloadReport};
pub use partition::CachedPartition;
pub use stats::CacheStats;
pub use view::PartitionView;
