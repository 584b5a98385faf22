//! In-memory dataset handed to the learning pipeline.
//!
//! Rows are samples, columns the fixed feature set extracted at the data
//! boundary; labels are failure-class codes in `0..NUM_CLASSES`. Integrity is
//! enforced at construction so downstream code can index freely.

use std::collections::BTreeMap;

use crate::error::{ClientError, Result};

/// The known label space: six failure classes.
pub const NUM_CLASSES: usize = 6;

/// Label value -> sample count, recomputed from the current label vector.
pub type ClassDistribution = BTreeMap<u32, usize>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    features: Vec<Vec<f32>>,
    labels: Vec<u32>,
}

impl Dataset {
    /// Builds a dataset, rejecting shape mismatches, out-of-range labels and
    /// non-finite feature values as fatal integrity violations.
    pub fn new(features: Vec<Vec<f32>>, labels: Vec<u32>) -> Result<Self> {
        if features.len() != labels.len() {
            return Err(ClientError::DataIntegrity {
                context: "dataset",
                detail: format!(
                    "{} feature rows but {} labels",
                    features.len(),
                    labels.len()
                ),
            });
        }
        let width = features.first().map(Vec::len).unwrap_or(0);
        for (row_idx, row) in features.iter().enumerate() {
            if row.len() != width {
                return Err(ClientError::DataIntegrity {
                    context: "dataset",
                    detail: format!(
                        "row {row_idx} has {} features, expected {width}",
                        row.len()
                    ),
                });
            }
            if let Some(col) = row.iter().position(|v| !v.is_finite()) {
                return Err(ClientError::DataIntegrity {
                    context: "dataset",
                    detail: format!("non-finite feature at row {row_idx}, column {col}"),
                });
            }
        }
        if let Some(row_idx) = labels.iter().position(|&l| l as usize >= NUM_CLASSES) {
            return Err(ClientError::DataIntegrity {
                context: "dataset",
                detail: format!(
                    "label {} at row {row_idx} outside the {NUM_CLASSES}-class label space",
                    labels[row_idx]
                ),
            });
        }
        Ok(Self { features, labels })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn num_features(&self) -> usize {
        self.features.first().map(Vec::len).unwrap_or(0)
    }

    pub fn features(&self) -> &[Vec<f32>] {
        &self.features
    }

    pub fn labels(&self) -> &[u32] {
        &self.labels
    }

    pub fn row(&self, idx: usize) -> &[f32] {
        &self.features[idx]
    }

    pub fn class_distribution(&self) -> ClassDistribution {
        class_distribution(&self.labels)
    }
}

pub fn class_distribution(labels: &[u32]) -> ClassDistribution {
    let mut dist = ClassDistribution::new();
    for &label in labels {
        *dist.entry(label).or_insert(0) += 1;
    }
    dist
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distribution_counts_labels() {
        let ds = Dataset::new(
            vec![vec![0.0], vec![1.0], vec![2.0], vec![3.0]],
            vec![0, 0, 1, 5],
        )
        .unwrap();
        let dist = ds.class_distribution();
        assert_eq!(dist.get(&0), Some(&2));
        assert_eq!(dist.get(&1), Some(&1));
        assert_eq!(dist.get(&5), Some(&1));
        assert_eq!(dist.len(), 3);
    }

    #[test]
    fn row_count_mismatch_is_fatal() {
        let err = Dataset::new(vec![vec![0.0]], vec![0, 1]).unwrap_err();
        assert!(matches!(err, ClientError::DataIntegrity { .. }));
    }

    #[test]
    fn ragged_rows_are_fatal() {
        let err = Dataset::new(vec![vec![0.0, 1.0], vec![0.0]], vec![0, 1]).unwrap_err();
        assert!(matches!(err, ClientError::DataIntegrity { .. }));
    }

    #[test]
    fn non_finite_features_are_fatal() {
        let err = Dataset::new(vec![vec![f32::NAN]], vec![0]).unwrap_err();
        assert!(matches!(err, ClientError::DataIntegrity { .. }));
    }

    #[test]
    fn out_of_range_label_is_fatal() {
        let err = Dataset::new(vec![vec![0.0]], vec![6]).unwrap_err();
        assert!(matches!(err, ClientError::DataIntegrity { .. }));
    }

    #[test]
    fn empty_dataset_is_valid() {
        let ds = Dataset::new(vec![], vec![]).unwrap();
        assert!(ds.is_empty());
        assert_eq!(ds.num_features(), 0);
    }
}
