//! Round-indexed metrics history.
//!
//! Append-only, one writer for the lifetime of the client. Persisted after
//! every successful evaluation as a JSON mapping from metric name to an
//! ordered list of `(round, value)` pairs.

use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    pub round: u64,
    pub loss: f32,
    pub accuracy: f32,
    pub f1_score: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsHistory {
    loss: Vec<(u64, f32)>,
    accuracy: Vec<(u64, f32)>,
    f1_score: Vec<(u64, f32)>,
}

impl MetricsHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, record: MetricsRecord) {
        self.loss.push((record.round, record.loss));
        self.accuracy.push((record.round, record.accuracy));
        self.f1_score.push((record.round, record.f1_score));
    }

    /// Number of evaluations recorded so far.
    pub fn len(&self) -> usize {
        self.loss.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loss.is_empty()
    }

    pub fn last_round(&self) -> Option<u64> {
        self.loss.last().map(|(round, _)| *round)
    }

    pub fn persist(&self, path: &Path) -> io::Result<()> {
        let json = serde_json::to_vec_pretty(self).map_err(io::Error::from)?;
        std::fs::write(path, json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_keeps_all_three_series_in_step() {
        let mut history = MetricsHistory::new();
        history.append(MetricsRecord {
            round: 1,
            loss: 0.9,
            accuracy: 0.4,
            f1_score: 0.3,
        });
        history.append(MetricsRecord {
            round: 2,
            loss: 0.7,
            accuracy: 0.5,
            f1_score: 0.45,
        });
        assert_eq!(history.len(), 2);
        assert_eq!(history.last_round(), Some(2));
    }

    #[test]
    fn persisted_shape_maps_metric_names_to_round_value_pairs() {
        let mut history = MetricsHistory::new();
        history.append(MetricsRecord {
            round: 3,
            loss: 0.5,
            accuracy: 0.8,
            f1_score: 0.75,
        });

        let path = std::env::temp_dir().join(format!(
            "fedmaint_metrics_shape_{}.json",
            std::process::id()
        ));
        history.persist(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["loss"][0][0], 3);
        assert!((value["accuracy"][0][1].as_f64().unwrap() - 0.8).abs() < 1e-6);
        assert!(value.get("f1_score").is_some());

        let _ = std::fs::remove_file(&path);
    }
}
