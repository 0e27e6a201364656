//! # mixppl
//!
//! Log-domain interpolation of language-model probability streams.
//!
//! Given two or more files of per-token natural-log probabilities, scored by
//! independent models over the same tokenized corpus, mixppl combines them
//! into one interpolated stream, searches for (or accepts) interpolation
//! weights, and reports perplexity, OOV rate and total log-likelihood.
//!
//! ## Principle
//!
//! ```text
//! K probability streams (aligned, one sentence per line)
//!     ↓
//! Reader: lock-step lines → accepted K-tuples + OOV count
//!     ↓
//! fixed weights → evaluator        optimize → simplex grid × evaluator
//!     ↓
//! RunStatistics (perplexity, OOV rate, log-likelihood)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use mixppl::{total_log_likelihood, Sample, WeightVector};
//!
//! # fn main() -> mixppl::Result<()> {
//! let samples: Vec<Sample> = vec![
//!     Sample::from_slice(&[-0.69, -1.20]),
//!     Sample::from_slice(&[-2.30, -0.51]),
//! ];
//! let weights = WeightVector::from_linear(vec![0.5, 0.5])?;
//! let ll = total_log_likelihood(&samples, &weights.log_weights());
//! assert!(ll < 0.0);
//! # Ok(())
//! # }
//! ```

// --- Global Allocator: mimalloc (Microsoft's high-performance allocator) ---
#[cfg(not(target_env = "msvc"))]
use mimalloc::MiMalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

pub mod likelihood;
pub mod log_domain;
pub mod prob_stream;
pub mod run_report;
pub mod weight_simplex;

pub use likelihood::{optimize_weights, total_log_likelihood};
pub use log_domain::{add_log_domain_probs, interpolate};
pub use prob_stream::{read_prob_streams, write_interpolated, ProbCorpus, Sample};
pub use run_report::RunStatistics;
pub use weight_simplex::{enumerate_weight_vectors, WeightVector, WEIGHT_SUM_TOLERANCE};

use thiserror::Error;

/// Reserved marker for tokens a model could not score.
pub const UNK_SYMBOL: &str = "<unk>";

/// Log-probability substituted for unknown tokens when the crossover policy
/// accepts a partially-known position. Effectively zero probability, safely
/// inside floating range.
pub const FALLBACK_LOG_PROB: f64 = -1000.0;

/// Default simplex search resolution (a 0.05 grid for two models).
pub const DEFAULT_RESOLUTION: u32 = 20;

/// Error types for mixppl operations
#[derive(Error, Debug)]
pub enum MixPplError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("usage error: {0}")]
    Usage(String),

    #[error("probability files do not match on line {line}")]
    Alignment { line: usize },

    #[error("line {line}: token {token:?} is neither a log-probability nor the unknown marker")]
    Format { line: usize, token: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MixPplError>;
