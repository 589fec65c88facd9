//! # Core Types
//!
//! Layer 0 vocabulary shared by every other crate: partition years and the
//! registry that validates them, column projections, row filters and the
//! well-known column names of the financial statements dataset.
//!
//! This crate performs no I/O and has no knowledge of how partitions are
//! stored or fetched.

pub mod columns;
pub mod enums;
pub mod error;
pub mod filter;
pub mod projection;
pub mod year;

// Re-export the core types to provide a clean public API.
pub use enums::FilterValue;
pub use error::CoreError;
pub use filter::RowFilter;
pub use projection::ColumnProjection;
pub use year::{PartitionRegistry, PartitionYear};
