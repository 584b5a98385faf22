//! Error taxonomy for the participant node.
//!
//! Only three conditions are allowed to escape a component: corrupted numeric
//! state, an uninterpretable wire payload, and a spent connection budget.
//! Balancing, training and evaluation failures are absorbed where they happen
//! and turn into fallback values instead.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    /// NaN or Inf detected in features, labels or weight tensors. The round
    /// cannot proceed on corrupted numeric state.
    #[error("data integrity violation in {context}: {detail}")]
    DataIntegrity {
        context: &'static str,
        detail: String,
    },

    /// The wire payload cannot be interpreted as an ordered list of tensors.
    #[error("cannot interpret wire parameters: {0}")]
    Conversion(String),

    /// The coordinator stayed unreachable for the whole retry budget. The one
    /// failure with no fallback: the process terminates.
    #[error("coordinator unreachable after {attempts} attempts: {detail}")]
    Connection { attempts: usize, detail: String },
}
