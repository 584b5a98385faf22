//! Round orchestration: the handler the coordinator drives once per round.
//!
//! `fit` owns the round counter and the balance-once cache; `evaluate` feeds
//! the metrics history. Integrity and conversion problems propagate, every
//! other failure has already been absorbed further down the pipeline.

use std::path::PathBuf;

use serde_json::Value;
use tracing::{info, warn};

use crate::balance;
use crate::codec::{self, WireTensor};
use crate::dataset::Dataset;
use crate::error::Result;
use crate::evaluator;
use crate::metrics::{MetricsHistory, MetricsRecord};
use crate::model::Model;
use crate::trainer;
use crate::weights::class_weights;

/// Opaque per-round configuration supplied by the coordinator.
pub type RoundConfig = serde_json::Map<String, Value>;

#[derive(Debug, Clone)]
pub struct FitOutput {
    pub parameters: Vec<WireTensor>,
    pub num_examples: usize,
    pub loss: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct EvaluateOutput {
    pub loss: f32,
    pub num_examples: usize,
    pub accuracy: f32,
    pub f1_score: f32,
}

/// The capability surface the coordinator invokes, one call at a time.
pub trait RoundHandler {
    /// Current local parameters, integrity-checked; no round side effects.
    fn get_parameters(&mut self, config: &RoundConfig) -> Result<Vec<WireTensor>>;

    /// One round of local training on the global parameters.
    fn fit(&mut self, parameters: &[WireTensor], config: &RoundConfig) -> Result<FitOutput>;

    /// Weighted evaluation of the global parameters on the local data.
    fn evaluate(
        &mut self,
        parameters: &[WireTensor],
        config: &RoundConfig,
    ) -> Result<EvaluateOutput>;
}

/// Stateful participant: owns the model, the (eventually balanced) dataset,
/// the round counter and the metrics history.
pub struct ParticipantHandler<M: Model> {
    device: String,
    model: M,
    dataset: Dataset,
    balanced: bool,
    balance_runs: u32,
    round: u64,
    history: MetricsHistory,
    metrics_path: PathBuf,
}

impl<M: Model> ParticipantHandler<M> {
    pub fn new(device: String, model: M, dataset: Dataset, metrics_path: PathBuf) -> Self {
        Self {
            device,
            model,
            dataset,
            balanced: false,
            balance_runs: 0,
            round: 0,
            history: MetricsHistory::new(),
            metrics_path,
        }
    }

    pub fn round(&self) -> u64 {
        self.round
    }

    /// How many times the balancer actually ran; it is expected to stay at 1.
    pub fn balance_runs(&self) -> u32 {
        self.balance_runs
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn history(&self) -> &MetricsHistory {
        &self.history
    }
}

impl<M: Model> RoundHandler for ParticipantHandler<M> {
    fn get_parameters(&mut self, config: &RoundConfig) -> Result<Vec<WireTensor>> {
        info!(device = %self.device, ?config, "get_parameters requested");
        codec::encode(&self.model.weights())
    }

    fn fit(&mut self, parameters: &[WireTensor], config: &RoundConfig) -> Result<FitOutput> {
        self.round += 1;
        info!(device = %self.device, round = self.round, ?config, "fit requested");

        let global = codec::decode(parameters)?;
        self.model.set_weights(&global)?;

        // balance once, reuse the result for every later round
        if !self.balanced {
            let original = std::mem::take(&mut self.dataset);
            self.dataset = balance::balance(original);
            self.balanced = true;
            self.balance_runs += 1;
            info!(
                device = %self.device,
                samples = self.dataset.len(),
                "balanced dataset cached for all rounds"
            );
        }

        let weights = class_weights(self.dataset.labels());
        info!(device = %self.device, round = self.round, class_weights = ?weights.per_class, "class weights computed");

        let outcome = trainer::train(&mut self.model, &self.dataset, &weights.per_sample, self.round);
        let parameters = codec::encode(&outcome.weights)?;
        Ok(FitOutput {
            parameters,
            num_examples: outcome.num_examples,
            loss: outcome.loss,
        })
    }

    fn evaluate(
        &mut self,
        parameters: &[WireTensor],
        config: &RoundConfig,
    ) -> Result<EvaluateOutput> {
        info!(device = %self.device, round = self.round, ?config, "evaluate requested");

        let global = codec::decode(parameters)?;
        self.model.set_weights(&global)?;

        let weights = class_weights(self.dataset.labels());
        let eval = evaluator::evaluate(&self.model, &self.dataset, &weights.per_sample);

        if eval.num_examples > 0 {
            self.history.append(MetricsRecord {
                round: self.round,
                loss: eval.loss,
                accuracy: eval.accuracy,
                f1_score: eval.f1_score,
            });
            if let Err(e) = self.history.persist(&self.metrics_path) {
                warn!(
                    device = %self.device,
                    path = %self.metrics_path.display(),
                    error = %e,
                    "failed to persist metrics history"
                );
            } else {
                info!(
                    device = %self.device,
                    path = %self.metrics_path.display(),
                    "metrics history persisted"
                );
            }
        }

        Ok(EvaluateOutput {
            loss: eval.loss,
            num_examples: eval.num_examples,
            accuracy: eval.accuracy,
            f1_score: eval.f1_score,
        })
    }
}
