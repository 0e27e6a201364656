//! Corpus-level run statistics
//!
//! Derived once at the end of a run from the accepted samples, the chosen
//! weights and the total log-likelihood; immutable afterwards.

use std::f64::consts::LN_10;
use std::fmt;

use serde::Serialize;

use crate::prob_stream::ProbCorpus;
use crate::weight_simplex::WeightVector;
use crate::Result;

/// Aggregate statistics for one interpolation run.
#[derive(Debug, Clone, Serialize)]
pub struct RunStatistics {
    pub num_sentences: usize,
    /// Accepted token positions, sentence-end samples included.
    pub num_words: usize,
    pub num_unks: usize,
    /// Chosen (or best found) linear interpolation weights.
    pub weights: Vec<f64>,
    /// Total interpolated log-likelihood, natural log.
    pub total_log_likelihood: f64,
    pub total_log10_likelihood: f64,
    /// Percentage of out-of-vocabulary positions.
    pub oov_rate: f64,
    pub perplexity: f64,
    /// Perplexity normalized by an externally supplied word count, for
    /// comparing runs over different tokenizations.
    pub word_normalized_perplexity: Option<f64>,
}

impl RunStatistics {
    pub fn new(
        corpus: &ProbCorpus,
        weights: &WeightVector,
        total_log_likelihood: f64,
        external_word_count: Option<u64>,
    ) -> Self {
        let num_words = corpus.num_words();
        // Compatibility formula: one always-in-vocabulary sentence-end
        // sample per sentence is subtracted from the word count. See the
        // known edge case note below.
        let denominator =
            corpus.num_unks as i64 + num_words as i64 - corpus.num_sentences as i64;
        let oov_rate = if denominator > 0 {
            100.0 * corpus.num_unks as f64 / denominator as f64
        } else {
            // Empty or boundary-only corpora drive the denominator to zero;
            // report 0.0 instead of a NaN rate.
            0.0
        };
        let perplexity = if num_words > 0 {
            (-total_log_likelihood / num_words as f64).exp()
        } else {
            0.0
        };
        let word_normalized_perplexity = external_word_count
            .filter(|&n| n > 0)
            .map(|n| (-total_log_likelihood / n as f64).exp());
        Self {
            num_sentences: corpus.num_sentences,
            num_words,
            num_unks: corpus.num_unks,
            weights: weights.linear().to_vec(),
            total_log_likelihood,
            total_log10_likelihood: total_log_likelihood / LN_10,
            oov_rate,
            perplexity,
            word_normalized_perplexity,
        }
    }

    /// Statistics as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for RunStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The report opens with a blank separator line
        writeln!(f)?;
        writeln!(f, "Number of sentences: {}", self.num_sentences)?;
        writeln!(
            f,
            "Number of in-vocabulary words excluding sentence ends: {}",
            self.num_words as i64 - self.num_sentences as i64
        )?;
        writeln!(
            f,
            "Number of in-vocabulary words including sentence ends: {}",
            self.num_words
        )?;
        writeln!(f, "Number of OOV words: {}", self.num_unks)?;
        let weights: Vec<String> = self.weights.iter().map(|w| format!("{w:.6}")).collect();
        writeln!(f, "Interpolation weights: {}", weights.join(", "))?;
        writeln!(f, "OOV rate: {:.6} %", self.oov_rate)?;
        writeln!(
            f,
            "Total log likelihood (ln): {:.5e}",
            self.total_log_likelihood
        )?;
        writeln!(
            f,
            "Total log likelihood (log10): {:.5e}",
            self.total_log10_likelihood
        )?;
        writeln!(f, "Perplexity: {:.2}", self.perplexity)?;
        if let Some(wnppl) = self.word_normalized_perplexity {
            writeln!(f, "Word-normalized perplexity: {wnppl:.6}")?;
        }
        Ok(())
    }
}
