//! Log-domain arithmetic for mixppl
//!
//! Probabilities are carried as natural logarithms everywhere in this crate,
//! so adding two probabilities requires leaving neither value's log
//! representation. The helpers here implement that addition and the weighted
//! mixture built on top of it.

/// Add two probabilities given as natural logarithms.
///
/// Computes `ln(exp(a) + exp(b))` without materializing either probability.
/// The larger input is used as the base so the exponentiated delta is always
/// `<= 1.0`, which keeps the computation inside floating range even for
/// inputs as small as the unknown-token fallback of −1000.0.
///
/// For `a == b` the result is exactly `a + ln(2)`.
pub fn add_log_domain_probs(a: f64, b: f64) -> f64 {
    let (base, delta) = if a > b { (a, b - a) } else { (b, a - b) };
    // A zero-probability term (−inf, from a zero linear weight) contributes
    // nothing to the sum; subtracting two −inf values would yield NaN.
    if base == f64::NEG_INFINITY || delta == f64::NEG_INFINITY {
        return base;
    }
    base + delta.exp().ln_1p()
}

/// Log of the weighted linear mixture `Σ w_i · p_i`.
///
/// Both the per-model probabilities `sample` and the weights `log_weights`
/// are natural logarithms; folding [`add_log_domain_probs`] over the sums
/// `w_i + p_i` yields the mixture without ever leaving the log domain.
///
/// Both slices must have the same, non-zero length.
pub fn interpolate(sample: &[f64], log_weights: &[f64]) -> f64 {
    debug_assert_eq!(sample.len(), log_weights.len());
    let mut mixed = log_weights[0] + sample[0];
    for (p, w) in sample[1..].iter().zip(&log_weights[1..]) {
        mixed = add_log_domain_probs(mixed, w + p);
    }
    mixed
}
