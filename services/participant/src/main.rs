//! Federated maintenance participant: loads this device's data partition,
//! dials the coordinator and serves rounds until told to stop.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde_json::json;
use tracing::info;

use fedmaint_core::dataset::Dataset;
use fedmaint_core::init_tracing;
use fedmaint_core::model::SoftmaxClassifier;
use fedmaint_core::round::ParticipantHandler;

use participant_node::config;
use participant_node::connection::ConnectionManager;
use participant_node::data::{self, Device};
use participant_node::session;

#[tokio::main]
async fn main() -> Result<()> {
    let device = parse_device_arg()?;
    init_tracing("participant-node").context("initializing tracing")?;

    let cfg = config::load().context("loading configuration")?;
    info!(%device, coordinator = %cfg.coordinator_addr, "participant node starting");

    let partition = data::load_partition(Path::new(&cfg.data_path), device, cfg.holdout_fraction)?;
    let metrics_dir = PathBuf::from(&cfg.metrics_dir);
    persist_holdout(&partition.holdout, &metrics_dir.join(format!("holdout_{device}.json")))?;

    let model = SoftmaxClassifier::new(partition.train.num_features());
    let metrics_path = metrics_dir.join(format!("client_{device}_metrics.json"));
    let mut handler =
        ParticipantHandler::new(device.to_string(), model, partition.train, metrics_path);

    let mut manager = ConnectionManager::new(&cfg);
    let mut channel = manager.connect().await?;
    let outcome = session::serve(&mut channel, &mut handler).await;
    manager.disconnect();

    outcome?;
    info!(%device, rounds = handler.round(), "participant node finished");
    Ok(())
}

fn parse_device_arg() -> Result<Device> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--device" {
            let value = args.next().context("--device requires a value")?;
            return value.parse();
        }
        if let Some(value) = arg.strip_prefix("--device=") {
            return value.parse();
        }
    }
    bail!("usage: participant-node --device {{L|M|H}}");
}

/// Kept aside at load time so later offline evaluation sees data the model
/// never trained on.
fn persist_holdout(holdout: &Dataset, path: &Path) -> Result<()> {
    let body = json!({
        "features": holdout.features(),
        "labels": holdout.labels(),
    });
    std::fs::write(path, serde_json::to_vec_pretty(&body)?)
        .with_context(|| format!("writing holdout {}", path.display()))?;
    info!(path = %path.display(), samples = holdout.len(), "holdout split persisted");
    Ok(())
}
