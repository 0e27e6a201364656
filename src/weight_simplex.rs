//! Interpolation weight vectors and weight-simplex enumeration
//!
//! A weight vector assigns one non-negative linear weight per model, summing
//! to 1.0. Vectors either come from the caller (validated here) or from the
//! simplex enumerator, which walks every strictly-positive integer
//! composition of the resolution.

use serde::Serialize;

use crate::{MixPplError, Result};

/// Tolerance for the linear-weight sum of caller-supplied vectors.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-5;

/// K non-negative linear weights summing to 1.0.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct WeightVector {
    weights: Vec<f64>,
}

impl WeightVector {
    /// Build a vector from caller-supplied linear weights.
    ///
    /// Every weight must lie in `[0.0, 1.0]` and the sum must be within
    /// [`WEIGHT_SUM_TOLERANCE`] of 1.0.
    pub fn from_linear(weights: Vec<f64>) -> Result<Self> {
        if weights.is_empty() {
            return Err(MixPplError::Usage(
                "at least one interpolation weight is required".to_string(),
            ));
        }
        for &w in &weights {
            if !w.is_finite() || !(0.0..=1.0).contains(&w) {
                return Err(MixPplError::Config(format!(
                    "invalid weight {w}, must be in the range [0.0, 1.0]"
                )));
            }
        }
        let sum: f64 = weights.iter().sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(MixPplError::Usage(format!(
                "weights sum to {sum}, expected 1.0"
            )));
        }
        Ok(Self { weights })
    }

    /// Normalize an integer composition of `resolution`. Enumerated parts
    /// are strictly positive and sum to the resolution by construction.
    fn from_composition(parts: &[u32], resolution: u32) -> Self {
        let inv = 1.0 / f64::from(resolution);
        Self {
            weights: parts.iter().map(|&p| f64::from(p) * inv).collect(),
        }
    }

    /// Number of models this vector weights.
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Linear weights.
    pub fn linear(&self) -> &[f64] {
        &self.weights
    }

    /// Natural-log weights, as consumed by the likelihood evaluator.
    pub fn log_weights(&self) -> Vec<f64> {
        self.weights.iter().map(|w| w.ln()).collect()
    }
}

/// Enumerate every weight vector on the simplex grid.
///
/// Walks all compositions of `resolution` into `num_models` strictly
/// positive integer parts and normalizes each by the resolution. The result
/// has exactly `C(resolution − 1, num_models − 1)` vectors, every entry
/// `> 0`, every sum exactly 1.0 up to division rounding. Order is
/// deterministic: the first part ascends, then recursively the rest.
pub fn enumerate_weight_vectors(num_models: usize, resolution: u32) -> Result<Vec<WeightVector>> {
    if num_models == 0 {
        return Err(MixPplError::Usage(
            "cannot enumerate weights for zero models".to_string(),
        ));
    }
    if (resolution as usize) < num_models {
        return Err(MixPplError::Usage(format!(
            "resolution {resolution} cannot be split into {num_models} positive parts"
        )));
    }
    let mut vectors = Vec::new();
    let mut parts = Vec::with_capacity(num_models);
    extend_composition(resolution, num_models, resolution, &mut parts, &mut vectors);
    Ok(vectors)
}

/// Recursive composition step: fix one part, leave at least one unit for
/// each remaining model.
fn extend_composition(
    resolution: u32,
    models_left: usize,
    remaining: u32,
    parts: &mut Vec<u32>,
    out: &mut Vec<WeightVector>,
) {
    if models_left == 1 {
        parts.push(remaining);
        out.push(WeightVector::from_composition(parts, resolution));
        parts.pop();
        return;
    }
    let max_here = remaining - (models_left as u32 - 1);
    for part in 1..=max_here {
        parts.push(part);
        extend_composition(resolution, models_left - 1, remaining - part, parts, out);
        parts.pop();
    }
}
