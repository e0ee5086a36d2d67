//! Per-feature input, output and relative-difference columns
//!
//! Inference yields one (num_nodes, 4) matrix pair per batch. For each
//! feature the matching column of every batch is appended in batch order,
//! then flattened into one array.

use anyhow::Result;

use super::features::Feature;
use crate::data::NUM_FEATURES;

/// `(output - input) / input`, elementwise
///
/// Zero inputs produce non-finite values; callers filter them.
pub fn relative_difference(output: &[f32], input: &[f32]) -> Vec<f32> {
    output
        .iter()
        .zip(input)
        .map(|(&o, &i)| (o - i) / i)
        .collect()
}

/// Column `ft_idx` of a row-major (rows, NUM_FEATURES) matrix
pub fn column(matrix: &[f32], ft_idx: usize) -> Vec<f32> {
    matrix
        .chunks_exact(NUM_FEATURES)
        .map(|row| row[ft_idx])
        .collect()
}

/// Flatten per-batch arrays in order
pub fn concat(parts: &[Vec<f32>]) -> Vec<f32> {
    let len = parts.iter().map(Vec::len).sum();
    let mut out = Vec::with_capacity(len);
    for part in parts {
        out.extend_from_slice(part);
    }
    out
}

/// Accumulates one feature's per-batch columns
#[derive(Debug, Clone)]
pub struct FeatureColumns {
    feature: Feature,
    diff: Vec<Vec<f32>>,
    output: Vec<Vec<f32>>,
    input: Vec<Vec<f32>>,
}

/// Concatenated columns of one feature
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureArrays {
    pub feature: Feature,
    /// Finite relative differences only
    pub diff: Vec<f32>,
    pub output: Vec<f32>,
    pub input: Vec<f32>,
    /// Relative differences dropped as non-finite
    pub dropped: usize,
}

impl FeatureColumns {
    pub fn new(feature: Feature) -> Self {
        Self {
            feature,
            diff: Vec::new(),
            output: Vec::new(),
            input: Vec::new(),
        }
    }

    /// Append this feature's column from one batch
    ///
    /// # Arguments
    /// * `output` - Model output, row-major (num_nodes, NUM_FEATURES)
    /// * `input` - Input node features, same shape
    pub fn append(&mut self, output: &[f32], input: &[f32]) -> Result<()> {
        if output.len() != input.len() || input.len() % NUM_FEATURES != 0 {
            anyhow::bail!(
                "Output ({} values) and input ({} values) are not matching (n, {}) matrices",
                output.len(),
                input.len(),
                NUM_FEATURES
            );
        }
        let out_col = column(output, self.feature.index());
        let in_col = column(input, self.feature.index());
        self.diff.push(relative_difference(&out_col, &in_col));
        self.output.push(out_col);
        self.input.push(in_col);
        Ok(())
    }

    pub fn num_batches(&self) -> usize {
        self.input.len()
    }

    /// Flatten the batches and drop non-finite differences
    pub fn concat(&self) -> FeatureArrays {
        let diff = concat(&self.diff);
        let total = diff.len();
        let diff: Vec<f32> = diff.into_iter().filter(|v| v.is_finite()).collect();
        FeatureArrays {
            feature: self.feature,
            dropped: total - diff.len(),
            diff,
            output: concat(&self.output),
            input: concat(&self.input),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_difference() {
        let diff = relative_difference(&[1.1, 2.0, -3.0], &[1.0, 4.0, -2.0]);
        assert!((diff[0] - 0.1).abs() < 1e-6);
        assert!((diff[1] - (-0.5)).abs() < 1e-6);
        assert!((diff[2] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_relative_difference_zero_input() {
        let diff = relative_difference(&[0.0, 1.0], &[0.0, 0.0]);
        assert!(diff[0].is_nan());
        assert!(diff[1].is_infinite());
    }

    #[test]
    fn test_column() {
        let m = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        assert_eq!(column(&m, 0), vec![1.0, 5.0]);
        assert_eq!(column(&m, 3), vec![4.0, 8.0]);
    }

    #[test]
    fn test_concat_preserves_count_and_order() {
        let parts = vec![vec![1.0, 2.0], vec![], vec![3.0], vec![4.0, 5.0, 6.0]];
        assert_eq!(concat(&parts), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_feature_columns_collect_batches() {
        let mut cols = FeatureColumns::new(Feature::E);
        // Batch 1: two nodes, E = 10 and 0
        let input1 = [0.0, 0.0, 0.0, 10.0, 0.0, 0.0, 0.0, 0.0];
        let output1 = [0.0, 0.0, 0.0, 12.0, 0.0, 0.0, 0.0, 1.0];
        // Batch 2: one node, E = 4
        let input2 = [0.0, 0.0, 0.0, 4.0];
        let output2 = [0.0, 0.0, 0.0, 3.0];

        cols.append(&output1, &input1).unwrap();
        cols.append(&output2, &input2).unwrap();
        assert_eq!(cols.num_batches(), 2);

        let arrays = cols.concat();
        assert_eq!(arrays.input, vec![10.0, 0.0, 4.0]);
        assert_eq!(arrays.output, vec![12.0, 1.0, 3.0]);
        // Zero-energy node dropped from the differences
        assert_eq!(arrays.dropped, 1);
        assert_eq!(arrays.diff.len(), 2);
        assert!((arrays.diff[0] - 0.2).abs() < 1e-6);
        assert!((arrays.diff[1] - (-0.25)).abs() < 1e-6);
    }

    #[test]
    fn test_append_rejects_mismatch() {
        let mut cols = FeatureColumns::new(Feature::Px);
        assert!(cols.append(&[0.0; 8], &[0.0; 4]).is_err());
        assert!(cols.append(&[0.0; 3], &[0.0; 3]).is_err());
    }
}
