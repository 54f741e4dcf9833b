//! Numeric helpers shared by the collector and the aggregator.
//!
//! Keeping percentile and bucket logic in one place means summary statistics and
//! windowed aggregations always agree on the same input.

/// Histogram upper bounds. The trailing infinity catches everything above 10000.
pub const HISTOGRAM_BOUNDARIES: [f64; 14] = [
    1.0,
    2.0,
    5.0,
    10.0,
    20.0,
    50.0,
    100.0,
    200.0,
    500.0,
    1_000.0,
    2_000.0,
    5_000.0,
    10_000.0,
    f64::INFINITY,
];

/// Index of the first boundary that is `>= value`.
///
/// Values that fit no boundary (NaN) land in the last slot.
pub fn locate_bucket(boundaries: &[f64], value: f64) -> usize {
    for (idx, boundary) in boundaries.iter().enumerate() {
        if value <= *boundary {
            return idx;
        }
    }
    boundaries.len().saturating_sub(1)
}

/// Nearest-rank percentile over an ascending slice: `sorted[ceil(n * p) - 1]`.
///
/// `p` is a fraction in `[0, 1]`. The index is clamped into the slice and an
/// empty slice yields `0.0`.
pub fn nearest_rank(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (sorted.len() as f64 * p).ceil() as i64 - 1;
    let idx = rank.clamp(0, sorted.len() as i64 - 1) as usize;
    sorted[idx]
}

/// Ascending copy of `values`; NaN sorts last.
pub fn sorted_copy<'a, I>(values: I) -> Vec<f64>
where
    I: IntoIterator<Item = &'a f64>,
{
    let mut sorted: Vec<f64> = values.into_iter().copied().collect();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Ordinary least-squares slope over the points `(index, ys[index])`.
pub fn linear_regression_slope(ys: &[f64]) -> f64 {
    let n = ys.len();
    if n < 2 {
        return 0.0;
    }
    let n_f = n as f64;
    let (mut sum_x, mut sum_y, mut sum_xy, mut sum_xx) = (0.0, 0.0, 0.0, 0.0);
    for (i, y) in ys.iter().enumerate() {
        let x = i as f64;
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_xx += x * x;
    }
    let denominator = n_f * sum_xx - sum_x * sum_x;
    if denominator == 0.0 {
        return 0.0;
    }
    (n_f * sum_xy - sum_x * sum_y) / denominator
}
