//! Inverse-frequency class weighting.
//!
//! Pure computation: given the current label vector, derive per-class weights
//! `total / (classes_present * count)` and the parallel per-sample vector.
//! A degenerate distribution falls back to uniform 1.0 over the six known
//! classes, so there is never a division by zero.

use std::collections::BTreeMap;

use tracing::warn;

use crate::dataset::{class_distribution, ClassDistribution, NUM_CLASSES};

#[derive(Debug, Clone, PartialEq)]
pub struct ClassWeights {
    pub distribution: ClassDistribution,
    pub per_class: BTreeMap<u32, f32>,
    pub per_sample: Vec<f32>,
}

pub fn class_weights(labels: &[u32]) -> ClassWeights {
    let distribution = class_distribution(labels);
    let degenerate = distribution.is_empty() || distribution.values().any(|&c| c == 0);

    let per_class: BTreeMap<u32, f32> = if degenerate {
        warn!("degenerate class distribution, falling back to uniform weights");
        (0..NUM_CLASSES as u32).map(|c| (c, 1.0)).collect()
    } else {
        let total = labels.len() as f32;
        let classes_present = distribution.len() as f32;
        distribution
            .iter()
            .map(|(&class, &count)| (class, total / (classes_present * count as f32)))
            .collect()
    };

    let per_sample = labels
        .iter()
        .map(|label| per_class.get(label).copied().unwrap_or(1.0))
        .collect();

    ClassWeights {
        distribution,
        per_class,
        per_sample,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_are_positive_and_rebalance_to_total() {
        let labels = vec![0, 0, 0, 0, 1, 1, 2, 2, 2, 2, 2, 2];
        let w = class_weights(&labels);

        assert!(w.per_sample.iter().all(|&x| x > 0.0));
        // sum over samples of their weight equals the sample count: every
        // class ends up carrying total / classes_present of the mass
        let sum: f32 = w.per_sample.iter().sum();
        assert!((sum - labels.len() as f32).abs() < 1e-4);
    }

    #[test]
    fn singleton_class_still_gets_finite_weights() {
        // [0,0,0,0,0,1]: too small for oversampling, weighting must cover it
        let labels = vec![0, 0, 0, 0, 0, 1];
        let w = class_weights(&labels);
        assert_eq!(w.per_class.len(), 2);
        assert!((w.per_class[&0] - 0.6).abs() < 1e-6);
        assert!((w.per_class[&1] - 3.0).abs() < 1e-6);
        assert!(w.per_sample.iter().all(|x| x.is_finite() && *x > 0.0));
    }

    #[test]
    fn empty_labels_fall_back_to_uniform_over_known_classes() {
        let w = class_weights(&[]);
        assert_eq!(w.per_class.len(), NUM_CLASSES);
        assert!(w.per_class.values().all(|&x| x == 1.0));
        assert!(w.per_sample.is_empty());
    }
}
