//! Core learning pipeline for federated predictive-maintenance participants.
//!
//! Everything a node needs between the wire and its private dataset: parameter
//! marshalling, class rebalancing and weighting, weighted local training and
//! evaluation, and the round handler the coordinator drives. Transport and
//! data loading live in the service crate.

use anyhow::Result;
use once_cell::sync::OnceCell;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

pub mod balance;
pub mod codec;
pub mod dataset;
pub mod error;
pub mod evaluator;
pub mod metrics;
pub mod model;
pub mod round;
pub mod trainer;
pub mod weights;

pub use codec::WireTensor;
pub use dataset::{ClassDistribution, Dataset, NUM_CLASSES};
pub use error::ClientError;
pub use evaluator::Evaluation;
pub use metrics::{MetricsHistory, MetricsRecord};
pub use model::{Model, SoftmaxClassifier, Tensor, WeightSet};
pub use round::{EvaluateOutput, FitOutput, ParticipantHandler, RoundConfig, RoundHandler};
pub use trainer::TrainOutcome;
pub use weights::{class_weights, ClassWeights};

static TRACING_INIT: OnceCell<()> = OnceCell::new();

/// Installs the fmt subscriber once per process. `FEDMAINT_JSON_LOG=1`
/// switches to JSON lines for log shippers; filtering follows `RUST_LOG`.
pub fn init_tracing(service: &str) -> Result<()> {
    TRACING_INIT.get_or_try_init(|| -> Result<()> {
        let json = std::env::var("FEDMAINT_JSON_LOG")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        let fmt_layer = if json {
            tracing_subscriber::fmt::layer()
                .json()
                .flatten_event(true)
                .boxed()
        } else {
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_line_number(true)
                .boxed()
        };
        tracing_subscriber::registry()
            .with(tracing_subscriber::EnvFilter::from_default_env())
            .with(fmt_layer)
            .try_init()?;
        Ok(())
    })?;
    info!(target: "fedmaint", service, "tracing initialized");
    Ok(())
}
