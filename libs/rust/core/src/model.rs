//! Local model seam.
//!
//! The round pipeline only ever talks to the `Model` trait: full-parameter
//! snapshots in a fixed tensor order, class scores, and one weighted SGD step.
//! `SoftmaxClassifier` is the concrete topology used by the participant binary;
//! anything with the same seam can replace it.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::dataset::NUM_CLASSES;
use crate::error::{ClientError, Result};

/// One dense numeric tensor; `dims` is the logical shape, `values` the
/// row-major flattening.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    pub dims: Vec<usize>,
    pub values: Vec<f32>,
}

/// Ordered full-model parameter snapshot. The order is fixed per model and
/// must match between encode and decode.
pub type WeightSet = Vec<Tensor>;

/// Rejects NaN/Inf anywhere in a weight set. Runs on both the receive and the
/// send path; a hit is unrecoverable corruption, not something to paper over.
pub fn check_finite(weights: &WeightSet, context: &'static str) -> Result<()> {
    for (idx, tensor) in weights.iter().enumerate() {
        if let Some(pos) = tensor.values.iter().position(|v| !v.is_finite()) {
            return Err(ClientError::DataIntegrity {
                context,
                detail: format!("tensor {idx} holds a non-finite value at offset {pos}"),
            });
        }
    }
    Ok(())
}

pub trait Model {
    /// Current parameters in the model's fixed tensor order.
    fn weights(&self) -> WeightSet;

    /// Replaces all parameters; fails on a shape mismatch.
    fn set_weights(&mut self, weights: &WeightSet) -> Result<()>;

    /// Class probabilities for one feature row, length `NUM_CLASSES`.
    fn scores(&self, features: &[f32]) -> Vec<f32>;

    /// One weighted SGD step over a mini-batch; returns the weighted mean
    /// cross-entropy loss measured before the update.
    fn train_batch(
        &mut self,
        rows: &[&[f32]],
        labels: &[u32],
        sample_weights: &[f32],
        lr: f32,
    ) -> f32;
}

/// Multinomial logistic regression over the six failure classes: a
/// `features x classes` weight matrix plus a bias vector, i.e. a two-tensor
/// weight set.
#[derive(Debug, Clone)]
pub struct SoftmaxClassifier {
    num_features: usize,
    weights: Vec<f32>, // [feature][class], row-major
    bias: Vec<f32>,
}

const INIT_SEED: u64 = 7;

impl SoftmaxClassifier {
    pub fn new(num_features: usize) -> Self {
        // Xavier-style init; the coordinator overwrites these on round one
        let mut rng = StdRng::seed_from_u64(INIT_SEED);
        let scale = (2.0 / (num_features + NUM_CLASSES) as f32).sqrt();
        let weights = (0..num_features * NUM_CLASSES)
            .map(|_| (rng.gen::<f32>() - 0.5) * 2.0 * scale)
            .collect();
        Self {
            num_features,
            weights,
            bias: vec![0.0; NUM_CLASSES],
        }
    }

    pub fn num_features(&self) -> usize {
        self.num_features
    }

    fn logits(&self, features: &[f32]) -> Vec<f32> {
        let mut logits = self.bias.clone();
        for (i, &x) in features.iter().take(self.num_features).enumerate() {
            for (j, logit) in logits.iter_mut().enumerate() {
                *logit += x * self.weights[i * NUM_CLASSES + j];
            }
        }
        logits
    }
}

impl Model for SoftmaxClassifier {
    fn weights(&self) -> WeightSet {
        vec![
            Tensor {
                dims: vec![self.num_features, NUM_CLASSES],
                values: self.weights.clone(),
            },
            Tensor {
                dims: vec![NUM_CLASSES],
                values: self.bias.clone(),
            },
        ]
    }

    fn set_weights(&mut self, weights: &WeightSet) -> Result<()> {
        let compatible = weights.len() == 2
            && weights[0].dims == [self.num_features, NUM_CLASSES]
            && weights[0].values.len() == self.weights.len()
            && weights[1].dims == [NUM_CLASSES]
            && weights[1].values.len() == self.bias.len();
        if !compatible {
            return Err(ClientError::Conversion(format!(
                "weight set does not fit a {}x{NUM_CLASSES} classifier: got shapes {:?}",
                self.num_features,
                weights.iter().map(|t| t.dims.clone()).collect::<Vec<_>>()
            )));
        }
        self.weights.copy_from_slice(&weights[0].values);
        self.bias.copy_from_slice(&weights[1].values);
        Ok(())
    }

    fn scores(&self, features: &[f32]) -> Vec<f32> {
        let logits = self.logits(features);
        let max = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let exps: Vec<f32> = logits.iter().map(|l| (l - max).exp()).collect();
        let sum: f32 = exps.iter().sum();
        exps.into_iter().map(|e| e / sum).collect()
    }

    fn train_batch(
        &mut self,
        rows: &[&[f32]],
        labels: &[u32],
        sample_weights: &[f32],
        lr: f32,
    ) -> f32 {
        let weight_total: f32 = sample_weights.iter().sum();
        if rows.is_empty() || weight_total <= 0.0 {
            return 0.0;
        }

        let mut grad_w = vec![0.0f32; self.weights.len()];
        let mut grad_b = vec![0.0f32; NUM_CLASSES];
        let mut loss = 0.0f32;

        for ((row, &label), &w) in rows.iter().zip(labels).zip(sample_weights) {
            let probs = self.scores(row);
            let target = label as usize;
            loss += w * -(probs[target].max(1e-12).ln());
            for j in 0..NUM_CLASSES {
                let indicator = if j == target { 1.0 } else { 0.0 };
                let g = w * (probs[j] - indicator) / weight_total;
                grad_b[j] += g;
                for (i, &x) in row.iter().take(self.num_features).enumerate() {
                    grad_w[i * NUM_CLASSES + j] += g * x;
                }
            }
        }

        for (wv, g) in self.weights.iter_mut().zip(&grad_w) {
            *wv -= lr * g;
        }
        for (bv, g) in self.bias.iter_mut().zip(&grad_b) {
            *bv -= lr * g;
        }
        loss / weight_total
    }
}
