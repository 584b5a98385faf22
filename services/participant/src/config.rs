//! Node configuration: defaults first, then an optional file, then
//! `FEDMAINT_*` environment overrides.

use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    /// `host:port` of the coordinating aggregator.
    pub coordinator_addr: String,
    /// Tabular dataset with per-sample features and the failure label.
    pub data_path: String,
    /// Where `client_<device>_metrics.json` files land.
    pub metrics_dir: String,
    pub max_connect_attempts: usize,
    pub connect_retry_secs: u64,
    pub handshake_timeout_secs: u64,
    /// Fraction of rows held out of the training split before scaling.
    pub holdout_fraction: f32,
}

pub fn load() -> Result<NodeConfig> {
    let mut builder = config::Config::builder()
        .set_default("coordinator_addr", "127.0.0.1:9000")?
        .set_default("data_path", "data/predictive_maintenance.csv")?
        .set_default("metrics_dir", ".")?
        .set_default("max_connect_attempts", 10)?
        .set_default("connect_retry_secs", 10)?
        .set_default("handshake_timeout_secs", 30)?
        .set_default("holdout_fraction", 0.2)?;

    if let Ok(file) = std::env::var("FEDMAINT_CONFIG_FILE") {
        builder = builder.add_source(config::File::with_name(&file).required(false));
    }
    builder = builder.add_source(config::Environment::with_prefix("FEDMAINT").separator("__"));

    let cfg = builder.build()?;
    Ok(cfg.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_protocol_budgets() {
        let cfg = load().unwrap();
        assert_eq!(cfg.coordinator_addr, "127.0.0.1:9000");
        assert_eq!(cfg.max_connect_attempts, 10);
        assert_eq!(cfg.connect_retry_secs, 10);
        assert_eq!(cfg.handshake_timeout_secs, 30);
    }
}
