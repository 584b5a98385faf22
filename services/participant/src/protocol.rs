//! Messages exchanged with the coordinator, one JSON object per line.
//!
//! The payload treats parameters as an ordered list of shaped float arrays
//! and assumes nothing else about the transport framing.

use fedmaint_core::round::RoundConfig;
use fedmaint_core::WireTensor;
use serde::{Deserialize, Serialize};

/// Coordinator -> participant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoundInstruction {
    /// First message on a fresh channel; confirms readiness.
    Hello { coordinator: String },
    GetParameters {
        #[serde(default)]
        config: RoundConfig,
    },
    Fit {
        parameters: Vec<WireTensor>,
        #[serde(default)]
        config: RoundConfig,
    },
    Evaluate {
        parameters: Vec<WireTensor>,
        #[serde(default)]
        config: RoundConfig,
    },
    Disconnect,
}

/// Participant -> coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoundReply {
    Parameters {
        parameters: Vec<WireTensor>,
    },
    FitResult {
        parameters: Vec<WireTensor>,
        num_examples: usize,
        loss: f32,
    },
    EvaluateResult {
        loss: f32,
        num_examples: usize,
        accuracy: f32,
        f1_score: f32,
    },
    Error {
        detail: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_instruction_round_trips_through_json() {
        let instruction = RoundInstruction::Fit {
            parameters: vec![WireTensor {
                dims: vec![1, 2],
                values: vec![0.5, -0.5],
            }],
            config: RoundConfig::new(),
        };
        let line = serde_json::to_string(&instruction).unwrap();
        let back: RoundInstruction = serde_json::from_str(&line).unwrap();
        match back {
            RoundInstruction::Fit { parameters, .. } => {
                assert_eq!(parameters[0].values, vec![0.5, -0.5]);
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn missing_config_defaults_to_empty() {
        let line = r#"{"type":"evaluate","parameters":[]}"#;
        let back: RoundInstruction = serde_json::from_str(line).unwrap();
        match back {
            RoundInstruction::Evaluate { config, .. } => assert!(config.is_empty()),
            other => panic!("wrong variant: {other:?}"),
        }
    }
}
