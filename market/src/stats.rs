//! Small numeric estimators shared by the market pulses.
//!
//! Every function is total: degenerate input (empty slices, zero
//! denominators, non-positive prices) yields `None` or a neutral `0.0`
//! instead of panicking or producing NaN.

/// Guard added to denominators that may legitimately be zero.
pub const EPS: f64 = 1e-9;

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn median(values: &[f64]) -> Option<f64> {
    percentile(values, 50.0)
}

/// Percentile with linear interpolation between closest ranks.
///
/// ```text
/// rank = pct / 100 * (n - 1)
/// ```
///
/// `pct` is clamped to `[0, 100]`.
pub fn percentile(values: &[f64], pct: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let rank = (pct.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;

    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Sample standard deviation (n - 1). Needs at least two values.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }

    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;

    Some(var.sqrt())
}

/// Least-squares slope of `values` against their index `0..n`.
pub fn linear_slope(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }

    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean = mean(values)?;

    let mut num = 0.0;
    let mut den = 0.0;
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        num += dx * (y - y_mean);
        den += dx * dx;
    }

    Some(num / (den + EPS))
}

/// Kaufman efficiency ratio: net move divided by path length, in `[0, 1]`.
///
/// A flat series has no path and reports `0.0`.
pub fn efficiency_ratio(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }

    let net = (values[values.len() - 1] - values[0]).abs();
    let path: f64 = values.windows(2).map(|w| (w[1] - w[0]).abs()).sum();

    if path <= 0.0 {
        return Some(0.0);
    }

    Some((net / path).clamp(0.0, 1.0))
}

/// Shannon entropy (natural log) of a quantity distribution.
///
/// ```text
/// H = -Σ pᵢ·ln(pᵢ),  pᵢ = qᵢ / Σq
/// ```
///
/// Zero-quantity entries contribute nothing; an empty or all-zero
/// distribution has entropy `0.0`.
pub fn shannon_entropy(quantities: &[f64]) -> f64 {
    let total: f64 = quantities.iter().filter(|q| **q > 0.0).sum();
    if total <= 0.0 {
        return 0.0;
    }

    quantities
        .iter()
        .filter(|q| **q > 0.0)
        .map(|q| {
            let p = q / total;
            -p * p.ln()
        })
        .sum()
}

/// Standard deviation of log-returns, ignoring stale ticks.
///
/// Returns whose magnitude is at or below `stale_epsilon` come from a feed
/// repeating the same print and are dropped before the statistic is taken.
/// Fewer than two remaining returns yields `0.0`.
pub fn log_return_volatility(prices: &[f64], stale_epsilon: f64) -> f64 {
    let returns: Vec<f64> = prices
        .windows(2)
        .filter(|w| w[0] > 0.0 && w[1] > 0.0)
        .map(|w| (w[1] / w[0]).ln())
        .filter(|r| r.is_finite() && r.abs() > stale_epsilon)
        .collect();

    std_dev(&returns).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn median_of_odd_and_even_sets() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn percentile_interpolates_between_ranks() {
        let v: Vec<f64> = (1..=5).map(|i| i as f64).collect();

        // rank = 0.2 * 4 = 0.8 -> 1 + 0.8 * (2 - 1)
        assert!(approx(percentile(&v, 20.0).unwrap(), 1.8));
        assert_eq!(percentile(&v, 0.0), Some(1.0));
        assert_eq!(percentile(&v, 100.0), Some(5.0));
        assert_eq!(percentile(&[7.0], 20.0), Some(7.0));
    }

    #[test]
    fn std_dev_needs_two_samples() {
        assert_eq!(std_dev(&[1.0]), None);
        assert!(approx(std_dev(&[1.0, 3.0]).unwrap(), 2f64.sqrt()));
    }

    #[test]
    fn slope_of_straight_line() {
        let v = [1.0, 3.0, 5.0, 7.0];
        assert!((linear_slope(&v).unwrap() - 2.0).abs() < 1e-6);

        let flat = [4.0; 6];
        assert!(linear_slope(&flat).unwrap().abs() < 1e-12);

        assert_eq!(linear_slope(&[1.0]), None);
    }

    #[test]
    fn efficiency_ratio_bounds() {
        assert_eq!(efficiency_ratio(&[1.0, 2.0, 3.0]), Some(1.0));
        assert_eq!(efficiency_ratio(&[1.0, 2.0, 1.0]), Some(0.0));
        assert_eq!(efficiency_ratio(&[5.0, 5.0, 5.0]), Some(0.0));
        assert_eq!(efficiency_ratio(&[5.0]), None);
    }

    #[test]
    fn entropy_of_uniform_and_concentrated_books() {
        let uniform = [100.0; 5];
        assert!(approx(shannon_entropy(&uniform), 5f64.ln()));

        let concentrated = [500.0, 0.0, 0.0, 0.0, 0.0];
        assert_eq!(shannon_entropy(&concentrated), 0.0);

        assert_eq!(shannon_entropy(&[0.0; 5]), 0.0);
        assert_eq!(shannon_entropy(&[]), 0.0);
    }

    #[test]
    fn volatility_ignores_repeated_prints() {
        let with_repeats = [10.0, 10.0, 10.1, 10.1, 10.1, 10.0, 10.0];
        let without = [10.0, 10.1, 10.0];

        let a = log_return_volatility(&with_repeats, 1e-9);
        let b = log_return_volatility(&without, 1e-9);

        assert!(a > 0.0);
        assert!(approx(a, b));
    }

    #[test]
    fn volatility_is_zero_without_enough_moves() {
        assert_eq!(log_return_volatility(&[10.0, 10.0, 10.0], 1e-9), 0.0);
        assert_eq!(log_return_volatility(&[10.0, 10.5], 1e-9), 0.0);
        assert_eq!(log_return_volatility(&[0.0, 10.0, 0.0], 1e-9), 0.0);
    }
}
