//! Weighted evaluation with per-class diagnostics.
//!
//! Returns loss, sample-weighted accuracy and support-weighted F1. Per-class
//! accuracy and the prediction distribution are logged for diagnosis but never
//! returned. Evaluation must not crash the client: an empty dataset or any
//! non-finite result collapses to the zero-metrics fallback.

use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::dataset::{Dataset, NUM_CLASSES};
use crate::model::Model;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub loss: f32,
    pub num_examples: usize,
    pub accuracy: f32,
    pub f1_score: f32,
}

impl Evaluation {
    /// The fallback reported when evaluation cannot produce real numbers.
    pub fn zeros() -> Self {
        Self {
            loss: 0.0,
            num_examples: 0,
            accuracy: 0.0,
            f1_score: 0.0,
        }
    }
}

pub fn evaluate<M: Model>(model: &M, dataset: &Dataset, sample_weights: &[f32]) -> Evaluation {
    let n = dataset.len();
    if n == 0 || sample_weights.len() != n {
        warn!(samples = n, "no usable data for evaluation");
        return Evaluation::zeros();
    }

    let mut weighted_loss = 0.0f32;
    let mut weight_total = 0.0f32;
    let mut correct = 0usize;
    let mut weighted_correct = 0.0f32;
    let mut predictions: Vec<u32> = Vec::with_capacity(n);

    for i in 0..n {
        let scores = model.scores(dataset.row(i));
        let predicted = argmax(&scores) as u32;
        let label = dataset.labels()[i];
        let w = sample_weights[i];

        weighted_loss += w * -(scores[label as usize].max(1e-12).ln());
        weight_total += w;
        if predicted == label {
            correct += 1;
            weighted_correct += w;
        }
        predictions.push(predicted);
    }

    let loss = weighted_loss / weight_total;
    let unweighted_accuracy = correct as f32 / n as f32;
    let weighted_accuracy = weighted_correct / weight_total;
    let f1 = weighted_f1(dataset.labels(), &predictions);

    if !loss.is_finite() || !f1.is_finite() || !weighted_accuracy.is_finite() {
        warn!("evaluation produced non-finite metrics, reporting the zero fallback");
        return Evaluation::zeros();
    }

    log_diagnostics(dataset.labels(), &predictions);
    info!(
        loss,
        unweighted_accuracy, weighted_accuracy, f1_score = f1, samples = n, "evaluation finished"
    );

    Evaluation {
        loss,
        num_examples: n,
        accuracy: weighted_accuracy,
        f1_score: f1,
    }
}

fn argmax(scores: &[f32]) -> usize {
    let mut best = 0;
    for (i, &s) in scores.iter().enumerate() {
        if s > scores[best] {
            best = i;
        }
    }
    best
}

/// F1 per class, averaged with class support as the weight (classes absent
/// from the labels contribute nothing).
fn weighted_f1(labels: &[u32], predictions: &[u32]) -> f32 {
    let mut f1_sum = 0.0f32;
    let total = labels.len() as f32;
    for class in 0..NUM_CLASSES as u32 {
        let tp = labels
            .iter()
            .zip(predictions)
            .filter(|(&l, &p)| l == class && p == class)
            .count() as f32;
        let fp = labels
            .iter()
            .zip(predictions)
            .filter(|(&l, &p)| l != class && p == class)
            .count() as f32;
        let fn_ = labels
            .iter()
            .zip(predictions)
            .filter(|(&l, &p)| l == class && p != class)
            .count() as f32;
        let support = tp + fn_;
        if support == 0.0 {
            continue;
        }
        let precision = if tp + fp > 0.0 { tp / (tp + fp) } else { 0.0 };
        let recall = tp / support;
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        f1_sum += f1 * support / total;
    }
    f1_sum
}

/// Diagnostic only: per-class accuracy and the prediction distribution.
fn log_diagnostics(labels: &[u32], predictions: &[u32]) {
    let mut class_accuracy: BTreeMap<u32, f32> = BTreeMap::new();
    for class in 0..NUM_CLASSES as u32 {
        let mut seen = 0usize;
        let mut hit = 0usize;
        for (&l, &p) in labels.iter().zip(predictions) {
            if l == class {
                seen += 1;
                if p == class {
                    hit += 1;
                }
            }
        }
        if seen > 0 {
            class_accuracy.insert(class, hit as f32 / seen as f32);
        }
    }

    let mut prediction_counts: BTreeMap<u32, usize> = BTreeMap::new();
    for &p in predictions {
        *prediction_counts.entry(p).or_insert(0) += 1;
    }

    info!(?class_accuracy, ?prediction_counts, "per-class diagnostics");
}
