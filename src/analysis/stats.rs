//! Summary statistics of relative differences
//!
//! All statistics ignore non-finite values. Percentiles interpolate linearly
//! between the two nearest ranks.

use super::features::Feature;

/// Lower percentile of the robust spread
pub const SPREAD_LOW_PERCENTILE: f64 = 16.0;
/// Upper percentile of the robust spread
pub const SPREAD_HIGH_PERCENTILE: f64 = 84.0;

/// Keep only finite values, preserving order
pub fn finite_only(values: &[f32]) -> Vec<f32> {
    values.iter().copied().filter(|v| v.is_finite()).collect()
}

/// Arithmetic mean of the finite values, `None` when there are none
pub fn mean(values: &[f32]) -> Option<f64> {
    let (sum, count) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((0.0f64, 0usize), |(s, n), &v| (s + v as f64, n + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// `q`-th percentile (0-100) of the finite values
pub fn percentile(values: &[f32], q: f64) -> Option<f64> {
    let mut sorted: Vec<f64> = values
        .iter()
        .filter(|v| v.is_finite())
        .map(|&v| v as f64)
        .collect();
    if sorted.is_empty() || !(0.0..=100.0).contains(&q) {
        return None;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));
    Some(percentile_of_sorted(&sorted, q))
}

fn percentile_of_sorted(sorted: &[f64], q: f64) -> f64 {
    let rank = q / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Half the distance between the 84th and 16th percentiles
///
/// Matches one standard deviation for a normal distribution while staying
/// insensitive to tails.
pub fn iqr_spread(values: &[f32]) -> Option<f64> {
    let mut sorted: Vec<f64> = values
        .iter()
        .filter(|v| v.is_finite())
        .map(|&v| v as f64)
        .collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));
    let low = percentile_of_sorted(&sorted, SPREAD_LOW_PERCENTILE);
    let high = percentile_of_sorted(&sorted, SPREAD_HIGH_PERCENTILE);
    Some((high - low) / 2.0)
}

/// Reported statistics of one feature's relative difference
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSummary {
    pub feature: Feature,
    /// Finite relative differences the statistics were computed over
    pub count: usize,
    pub mean: Option<f64>,
    pub spread: Option<f64>,
}

impl FeatureSummary {
    pub fn from_diff(feature: Feature, diff: &[f32]) -> Self {
        Self {
            feature,
            count: diff.iter().filter(|v| v.is_finite()).count(),
            mean: mean(diff),
            spread: iqr_spread(diff),
        }
    }

    /// Console lines: label, mean and spread
    pub fn lines(&self) -> [String; 3] {
        [
            self.feature.label(),
            format!("mean: {}", fmt_stat(self.mean)),
            format!("iqr: {}", fmt_stat(self.spread)),
        ]
    }
}

fn fmt_stat(value: Option<f64>) -> String {
    value.map_or_else(|| "nan".to_string(), |v| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_excludes_nan() {
        let diff = [-0.1f32, 0.0, 0.1, 0.2, f32::NAN];
        let expected = (-0.1f64 + 0.0 + 0.1 + 0.2) / 4.0;
        assert!((mean(&diff).unwrap() - expected).abs() < 1e-6);
    }

    #[test]
    fn test_mean_excludes_infinity() {
        let diff = [1.0f32, 3.0, f32::INFINITY, f32::NEG_INFINITY];
        assert_eq!(mean(&diff), Some(2.0));
        assert_eq!(mean(&[f32::NAN]), None);
        assert_eq!(mean(&[]), None);
    }

    #[test]
    fn test_finite_only_keeps_order() {
        let kept = finite_only(&[3.0, f32::NAN, -1.0, f32::INFINITY, 2.0]);
        assert_eq!(kept, vec![3.0, -1.0, 2.0]);
    }

    #[test]
    fn test_percentile_linear_interpolation() {
        let values = [4.0f32, 1.0, 3.0, 2.0, 5.0];
        assert_eq!(percentile(&values, 0.0), Some(1.0));
        assert_eq!(percentile(&values, 50.0), Some(3.0));
        assert_eq!(percentile(&values, 100.0), Some(5.0));
        // rank 0.16 * 4 = 0.64
        assert!((percentile(&values, 16.0).unwrap() - 1.64).abs() < 1e-9);
        assert_eq!(percentile(&values, 101.0), None);
    }

    #[test]
    fn test_iqr_spread() {
        let values: Vec<f32> = (0..=100).map(|i| i as f32).collect();
        // P84 = 84, P16 = 16
        assert!((iqr_spread(&values).unwrap() - 34.0).abs() < 1e-9);
        assert_eq!(iqr_spread(&[f32::NAN]), None);
        assert_eq!(iqr_spread(&[0.5]), Some(0.0));
    }

    #[test]
    fn test_summary_lines() {
        let summary = FeatureSummary::from_diff(Feature::Px, &[0.5, 0.5, f32::NAN]);
        assert_eq!(summary.count, 2);
        let lines = summary.lines();
        assert_eq!(lines[0], "p_x [GeV]");
        assert_eq!(lines[1], "mean: 0.5");
        assert_eq!(lines[2], "iqr: 0");

        let empty = FeatureSummary::from_diff(Feature::E, &[]);
        assert_eq!(empty.lines()[1], "mean: nan");
    }
}
