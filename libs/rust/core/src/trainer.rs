//! Bounded-epoch local training with learning-rate decay and early stopping.
//!
//! Failure policy: an empty or NaN loss history is a soft failure. The round
//! reports the model's current weights and a zero loss instead of erroring,
//! so one corrupted round never knocks the participant out of the federation.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::dataset::Dataset;
use crate::model::{Model, WeightSet};

pub const EPOCHS: usize = 5;
pub const BATCH_SIZE: usize = 64;
pub const INITIAL_LR: f32 = 0.001;
pub const LR_DECAY: f32 = 0.1;
pub const PATIENCE: usize = 3;

/// `lr(e) = lr0 / (1 + decay * e)`: monotonically decreasing, deterministic
/// in the epoch index.
pub fn learning_rate(epoch: usize) -> f32 {
    INITIAL_LR / (1.0 + LR_DECAY * epoch as f32)
}

#[derive(Debug, Clone)]
pub struct TrainOutcome {
    pub weights: WeightSet,
    pub num_examples: usize,
    pub loss: f32,
}

pub fn train<M: Model>(
    model: &mut M,
    dataset: &Dataset,
    sample_weights: &[f32],
    round: u64,
) -> TrainOutcome {
    let n = dataset.len();
    if sample_weights.len() != n {
        warn!(
            round,
            samples = n,
            weights = sample_weights.len(),
            "sample weights out of step with the dataset, keeping current weights"
        );
        return soft_failure(model, n);
    }

    let mut rng = StdRng::seed_from_u64(round);
    let mut order: Vec<usize> = (0..n).collect();
    let mut epoch_losses: Vec<f32> = Vec::with_capacity(EPOCHS);
    let mut best_loss = f32::INFINITY;
    let mut best_weights: Option<WeightSet> = None;
    let mut stale_epochs = 0usize;

    for epoch in 0..EPOCHS {
        let lr = learning_rate(epoch);
        order.shuffle(&mut rng);

        let mut weighted_loss = 0.0f32;
        let mut weight_total = 0.0f32;
        for chunk in order.chunks(BATCH_SIZE) {
            let rows: Vec<&[f32]> = chunk.iter().map(|&i| dataset.row(i)).collect();
            let labels: Vec<u32> = chunk.iter().map(|&i| dataset.labels()[i]).collect();
            let batch_w: Vec<f32> = chunk.iter().map(|&i| sample_weights[i]).collect();

            let batch_loss = model.train_batch(&rows, &labels, &batch_w, lr);
            let batch_weight: f32 = batch_w.iter().sum();
            weighted_loss += batch_loss * batch_weight;
            weight_total += batch_weight;
        }
        if weight_total <= 0.0 {
            break; // nothing trainable this round
        }

        let epoch_loss = weighted_loss / weight_total;
        debug!(round, epoch, lr, loss = epoch_loss, "epoch finished");
        epoch_losses.push(epoch_loss);
        if epoch_loss.is_nan() {
            break;
        }

        if epoch_loss < best_loss {
            best_loss = epoch_loss;
            best_weights = Some(model.weights());
            stale_epochs = 0;
        } else {
            stale_epochs += 1;
            if stale_epochs >= PATIENCE {
                if let Some(best) = best_weights.take() {
                    if let Err(e) = model.set_weights(&best) {
                        warn!(round, error = %e, "failed to restore best weights");
                    }
                }
                info!(round, epoch, best_loss, "early stopping, best weights restored");
                break;
            }
        }
    }

    if epoch_losses.is_empty() || epoch_losses.iter().any(|l| l.is_nan()) {
        warn!(round, "training produced an invalid loss history, keeping current weights");
        return soft_failure(model, n);
    }

    let final_loss = epoch_losses.last().copied().unwrap_or(0.0);
    info!(
        round,
        loss = final_loss,
        epochs = epoch_losses.len(),
        samples = n,
        "training completed"
    );
    TrainOutcome {
        weights: model.weights(),
        num_examples: n,
        loss: final_loss,
    }
}

fn soft_failure<M: Model>(model: &M, num_examples: usize) -> TrainOutcome {
    TrainOutcome {
        weights: model.weights(),
        num_examples,
        loss: 0.0,
    }
}
