use crate::error::AnalyticsError;

/// Returns the observation at quantile `q` using nearest-rank selection.
///
/// The values are sorted and the element at `round((n - 1) * q)` is returned,
/// so the result is always one of the inputs. `NaN` observations are ignored.
/// Returns `Ok(None)` when no usable observation remains.
pub fn nearest_rank_quantile(values: &[f64], q: f64) -> Result<Option<f64>, AnalyticsError> {
    if !(0.0..=1.0).contains(&q) {
        return Err(AnalyticsError::InvalidQuantile(q));
    }

    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() {
        return Ok(None);
    }
    sorted.sort_by(f64::total_cmp);

    let rank = ((sorted.len() - 1) as f64 * q).round() as usize;
    Ok(sorted.get(rank).copied())
}

/// Nearest-rank median. For an even sample this picks the upper of the two
/// middle observations.
pub fn nearest_rank_median(values: &[f64]) -> Option<f64> {
    // 0.5 is always a valid quantile.
    nearest_rank_quantile(values, 0.5).ok().flatten()
}
