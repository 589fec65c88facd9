use serde::Serialize;

/// Operational snapshot of the partition cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Cached years, ascending.
    pub cached_years: Vec<i32>,
    pub count: usize,
    pub approx_bytes: usize,
    pub total_rows: usize,
}

impl CacheStats {
    pub fn approx_megabytes(&self) -> f64 {
        self.approx_bytes as f64 / (1024.0 * 1024.0)
    }
}
