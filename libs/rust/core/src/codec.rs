//! Parameter marshalling between the wire and the model.
//!
//! The wire representation is an ordered list of shaped float arrays; nothing
//! more is assumed about the transport. `decode` and `encode` are inverses
//! for every weight set a model actually produces, and both paths run the
//! NaN/Inf integrity check.

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};
use crate::model::{check_finite, Tensor, WeightSet};

/// A single tensor as it travels on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireTensor {
    pub dims: Vec<usize>,
    pub values: Vec<f32>,
}

/// Interprets wire parameters as an ordered weight set.
///
/// Fails with `Conversion` when a tensor's shape does not describe its
/// payload, and with `DataIntegrity` when any value is NaN or Inf.
pub fn decode(wire: &[WireTensor]) -> Result<WeightSet> {
    let mut tensors = Vec::with_capacity(wire.len());
    for (idx, t) in wire.iter().enumerate() {
        if t.dims.is_empty() || t.dims.iter().product::<usize>() != t.values.len() {
            return Err(ClientError::Conversion(format!(
                "tensor {idx}: shape {:?} does not describe {} values",
                t.dims,
                t.values.len()
            )));
        }
        tensors.push(Tensor {
            dims: t.dims.clone(),
            values: t.values.clone(),
        });
    }
    check_finite(&tensors, "global parameters")?;
    Ok(tensors)
}

/// Converts a weight set back to its wire form, order preserved. Local
/// parameters are integrity-checked before they ever leave the node.
pub fn encode(weights: &WeightSet) -> Result<Vec<WireTensor>> {
    check_finite(weights, "local parameters")?;
    Ok(weights
        .iter()
        .map(|t| WireTensor {
            dims: t.dims.clone(),
            values: t.values.clone(),
        })
        .collect())
}
