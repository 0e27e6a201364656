//! Likelihood evaluation and simplex weight search
//!
//! The evaluator is a single pass over the accepted samples; the optimizer
//! runs it once per candidate weight vector. The candidate evaluations are
//! independent read-only folds, so they run on the rayon pool, with the
//! reduction carrying candidate indices to keep the sequential first-maximum
//! tie-break.

use log::info;
use rayon::prelude::*;

use crate::prob_stream::Sample;
use crate::weight_simplex::{enumerate_weight_vectors, WeightVector};
use crate::{log_domain, MixPplError, Result};

/// Total interpolated log-likelihood of `samples` under `log_weights`.
pub fn total_log_likelihood(samples: &[Sample], log_weights: &[f64]) -> f64 {
    samples
        .iter()
        .map(|sample| log_domain::interpolate(sample, log_weights))
        .sum()
}

/// Exhaustive search of the weight simplex at the given resolution.
///
/// Every enumerated vector is evaluated over the full sample sequence; the
/// first vector (in enumeration order) reaching the maximum likelihood wins.
/// The dominant cost of a run: `O(C(resolution−1, K−1) · samples.len())`.
pub fn optimize_weights(
    samples: &[Sample],
    num_models: usize,
    resolution: u32,
) -> Result<(WeightVector, f64)> {
    let candidates = enumerate_weight_vectors(num_models, resolution)?;
    info!(
        "searching {} weight vectors at resolution {} over {} samples",
        candidates.len(),
        resolution,
        samples.len()
    );
    let (_, best_ll, best) = candidates
        .into_par_iter()
        .enumerate()
        .map(|(idx, wv)| {
            let ll = total_log_likelihood(samples, &wv.log_weights());
            (idx, ll, wv)
        })
        .reduce_with(|a, b| {
            // strict improvement or an earlier candidate at equal likelihood
            if b.1 > a.1 || (b.1 == a.1 && b.0 < a.0) {
                b
            } else {
                a
            }
        })
        .ok_or_else(|| MixPplError::Usage("no candidate weight vectors".to_string()))?;
    info!(
        "best weights {:?} with total log-likelihood {best_ll:.5e}",
        best.linear()
    );
    Ok((best, best_ll))
}
