//! Percentile estimators over a group's collected values.
//!
//! Both take a slice already sorted ascending and `p` on the 0..=100
//! scale.

#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::suboptimal_flops
)]

/// Interpolated percentile.
///
/// Position estimator `pos = p * (n + 1) / 100`. Positions below the first
/// element clamp to the minimum and positions at or past the last clamp to
/// the maximum; anything between interpolates linearly between the two
/// neighbouring ranks. Empty input, or a non-finite `p`, yields NaN.
pub fn interpolated(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 0 || !p.is_finite() {
        return f64::NAN;
    }
    if n == 1 {
        return sorted[0];
    }
    let pos = p * (n as f64 + 1.0) / 100.0;
    let lower_pos = pos.floor();
    let frac = pos - lower_pos;
    if pos < 1.0 {
        return sorted[0];
    }
    if pos >= n as f64 {
        return sorted[n - 1];
    }
    let lower = sorted[lower_pos as usize - 1];
    let upper = sorted[lower_pos as usize];
    lower + frac * (upper - lower)
}

/// Nearest-rank percentile: the element at 1-based rank
/// `ceil(p / 100 * n)`, clamped to `[1, n]`. `None` for empty input or a
/// non-finite `p`.
pub fn nearest_rank(sorted: &[f64], p: f64) -> Option<f64> {
    let n = sorted.len();
    if n == 0 || !p.is_finite() {
        return None;
    }
    let rank = (p / 100.0 * n as f64).ceil();
    let rank = if rank < 1.0 { 1 } else { (rank as usize).min(n) };
    Some(sorted[rank - 1])
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn median_even_count() {
        assert_close(interpolated(&[1.0, 2.0, 3.0, 4.0], 50.0), 2.5);
    }

    #[test]
    fn median_odd_count() {
        assert_close(interpolated(&[1.0, 2.0, 3.0, 4.0, 5.0], 50.0), 3.0);
    }

    #[test]
    fn interpolated_clamps_at_ends() {
        let v = [10.0, 20.0, 30.0];
        assert_close(interpolated(&v, 10.0), 10.0);
        assert_close(interpolated(&v, 100.0), 30.0);
        // pos = 0.9 * 4 = 3.6 >= n
        assert_close(interpolated(&v, 90.0), 30.0);
        // pos = 0.6 * 4 = 2.4, between ranks 2 and 3
        assert_close(interpolated(&v, 60.0), 24.0);
    }

    #[test]
    fn interpolated_single_and_empty() {
        assert_close(interpolated(&[7.0], 25.0), 7.0);
        assert!(interpolated(&[], 50.0).is_nan());
    }

    #[test]
    fn nearest_rank_picks_data_point() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(nearest_rank(&v, 50.0), Some(2.0));
        assert_eq!(nearest_rank(&v, 51.0), Some(3.0));
        assert_eq!(nearest_rank(&v, 100.0), Some(4.0));
        assert_eq!(nearest_rank(&v, 0.0), Some(1.0));
        assert_eq!(nearest_rank(&[], 50.0), None);
    }

    #[test]
    fn non_finite_percentile_does_not_index() {
        let v = [1.0, 2.0, 3.0];
        assert!(interpolated(&v, f64::NAN).is_nan());
        assert!(interpolated(&v, f64::INFINITY).is_nan());
        assert_eq!(nearest_rank(&v, f64::NAN), None);
        assert_eq!(nearest_rank(&v, f64::NEG_INFINITY), None);
    }
}
