//! Aligned probability streams
//!
//! Each input file carries one sentence per line, one whitespace-separated
//! token per corpus position: either a natural-log probability or the
//! reserved unknown marker. All K files for a run were scored over the same
//! tokenized corpus, so the reader walks them in lock-step and refuses to
//! continue the moment a line's token counts disagree.
//!
//! Files ending in `.gz` are decompressed transparently, on the read and the
//! write side.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use log::info;
use smallvec::SmallVec;

use crate::{log_domain, MixPplError, Result, WeightVector, FALLBACK_LOG_PROB, UNK_SYMBOL};

/// Per-position natural-log probabilities, one entry per model.
pub type Sample = SmallVec<[f64; 4]>;

/// The accepted samples of a corpus plus the bookkeeping the report needs.
#[derive(Debug, Clone, Default)]
pub struct ProbCorpus {
    /// Accepted K-tuples, in corpus order.
    pub samples: Vec<Sample>,
    /// Positions rejected by the unknown-token policy.
    pub num_unks: usize,
    /// Lines read from the first stream, empty lines included.
    pub num_sentences: usize,
}

impl ProbCorpus {
    /// Number of accepted token positions.
    pub fn num_words(&self) -> usize {
        self.samples.len()
    }
}

fn open_reader(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path)?;
    if path.extension().is_some_and(|ext| ext == "gz") {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

fn open_writer(path: &Path) -> Result<Box<dyn Write>> {
    let file = File::create(path)?;
    if path.extension().is_some_and(|ext| ext == "gz") {
        Ok(Box::new(BufWriter::new(GzEncoder::new(
            file,
            Compression::default(),
        ))))
    } else {
        Ok(Box::new(BufWriter::new(file)))
    }
}

/// K probability files advanced one line at a time, lock-step.
struct StreamSet {
    readers: Vec<Box<dyn BufRead>>,
    lines: Vec<String>,
    line_no: usize,
}

impl StreamSet {
    fn open<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        if paths.is_empty() {
            return Err(MixPplError::Usage(
                "at least one probability file is required".to_string(),
            ));
        }
        let readers = paths
            .iter()
            .map(|p| open_reader(p.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        let lines = vec![String::new(); readers.len()];
        Ok(Self {
            readers,
            lines,
            line_no: 0,
        })
    }

    /// Advance every stream one line. `Ok(false)` once the first stream is
    /// exhausted; a shorter non-first stream simply yields empty lines and
    /// fails the alignment check instead.
    fn advance(&mut self) -> Result<bool> {
        self.lines[0].clear();
        if self.readers[0].read_line(&mut self.lines[0])? == 0 {
            return Ok(false);
        }
        self.line_no += 1;
        for s in 1..self.readers.len() {
            self.lines[s].clear();
            self.readers[s].read_line(&mut self.lines[s])?;
        }
        Ok(true)
    }

    /// Whitespace tokens of the current line, per stream, validated to agree
    /// on the token count.
    fn aligned_tokens(&self) -> Result<Vec<Vec<&str>>> {
        let tokens: Vec<Vec<&str>> = self
            .lines
            .iter()
            .map(|line| line.split_whitespace().collect())
            .collect();
        let expected = tokens[0].len();
        if tokens.iter().any(|t| t.len() != expected) {
            return Err(MixPplError::Alignment { line: self.line_no });
        }
        Ok(tokens)
    }
}

/// Resolve one aligned position against the unknown-token policy.
///
/// `Ok(None)` means the position is out-of-vocabulary; `Ok(Some(sample))`
/// carries the per-model log-probabilities with unknown entries substituted
/// by [`FALLBACK_LOG_PROB`]. Any token that is neither the unknown marker
/// nor a finite real number is a fatal format error.
fn resolve_position(
    tokens: &[Vec<&str>],
    pos: usize,
    line: usize,
    allow_unknown_crossover: bool,
) -> Result<Option<Sample>> {
    let mut sample = Sample::with_capacity(tokens.len());
    let mut unk_found = false;
    let mut prob_found = false;
    for stream_tokens in tokens {
        let raw = stream_tokens[pos];
        if raw == UNK_SYMBOL {
            unk_found = true;
            sample.push(FALLBACK_LOG_PROB);
        } else {
            match raw.parse::<f64>() {
                Ok(value) if value.is_finite() => {
                    prob_found = true;
                    sample.push(value);
                }
                _ => {
                    return Err(MixPplError::Format {
                        line,
                        token: raw.to_string(),
                    })
                }
            }
        }
    }
    let rejected = if allow_unknown_crossover {
        !prob_found
    } else {
        unk_found
    };
    Ok(if rejected { None } else { Some(sample) })
}

/// Read K aligned probability streams into memory.
///
/// With `allow_unknown_crossover` unset, a position is out-of-vocabulary as
/// soon as any model marks it unknown. With it set, only positions unknown
/// to every model are rejected; partially-known positions keep the known
/// values and take the fallback probability for the rest.
pub fn read_prob_streams<P: AsRef<Path>>(
    paths: &[P],
    allow_unknown_crossover: bool,
) -> Result<ProbCorpus> {
    let mut streams = StreamSet::open(paths)?;
    let mut corpus = ProbCorpus::default();
    while streams.advance()? {
        let tokens = streams.aligned_tokens()?;
        for pos in 0..tokens[0].len() {
            match resolve_position(&tokens, pos, streams.line_no, allow_unknown_crossover)? {
                Some(sample) => corpus.samples.push(sample),
                None => corpus.num_unks += 1,
            }
        }
    }
    corpus.num_sentences = streams.line_no;
    info!(
        "read {} samples from {} streams ({} sentences, {} OOV)",
        corpus.samples.len(),
        paths.len(),
        corpus.num_sentences,
        corpus.num_unks
    );
    Ok(corpus)
}

/// Re-read the K streams and write the interpolated log-probability stream.
///
/// The output keeps the line and token shape of the inputs: rejected
/// positions are written as the unknown marker, accepted positions as the
/// interpolated natural-log probability.
pub fn write_interpolated<P: AsRef<Path>>(
    paths: &[P],
    out_path: &Path,
    weights: &WeightVector,
    allow_unknown_crossover: bool,
) -> Result<()> {
    if weights.len() != paths.len() {
        return Err(MixPplError::Usage(format!(
            "{} weights supplied for {} probability files",
            weights.len(),
            paths.len()
        )));
    }
    let log_weights = weights.log_weights();
    let mut streams = StreamSet::open(paths)?;
    let mut out = open_writer(out_path)?;
    let mut rendered: Vec<String> = Vec::new();
    while streams.advance()? {
        let tokens = streams.aligned_tokens()?;
        rendered.clear();
        for pos in 0..tokens[0].len() {
            match resolve_position(&tokens, pos, streams.line_no, allow_unknown_crossover)? {
                Some(sample) => {
                    rendered.push(format!("{:.4e}", log_domain::interpolate(&sample, &log_weights)));
                }
                None => rendered.push(UNK_SYMBOL.to_string()),
            }
        }
        writeln!(out, "{}", rendered.join(" "))?;
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Read;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write_fixture(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    fn write_gz_fixture(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut enc = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        enc.write_all(contents.as_bytes()).unwrap();
        enc.finish().unwrap();
        path
    }

    #[test]
    fn test_two_aligned_streams() {
        let dir = TempDir::new().unwrap();
        let f1 = write_fixture(&dir, "m1.probs", "-0.5 -1.5\n-2.0\n");
        let f2 = write_fixture(&dir, "m2.probs", "-0.6 -1.6\n-2.1\n");

        let corpus = read_prob_streams(&[f1, f2], false).unwrap();
        assert_eq!(corpus.num_sentences, 2);
        assert_eq!(corpus.num_unks, 0);
        assert_eq!(corpus.samples.len(), 3);
        assert_eq!(corpus.samples[0].as_slice(), &[-0.5, -0.6]);
        assert_eq!(corpus.samples[2].as_slice(), &[-2.0, -2.1]);
    }

    #[test]
    fn test_alignment_error_reports_line_number() {
        let dir = TempDir::new().unwrap();
        let f1 = write_fixture(&dir, "m1.probs", "-0.5 -1.5\n-2.0 -3.0\n");
        let f2 = write_fixture(&dir, "m2.probs", "-0.6 -1.6\n-2.1\n");

        let err = read_prob_streams(&[f1, f2], false).unwrap_err();
        assert!(matches!(err, MixPplError::Alignment { line: 2 }));
    }

    #[test]
    fn test_shorter_second_stream_fails_alignment() {
        let dir = TempDir::new().unwrap();
        let f1 = write_fixture(&dir, "m1.probs", "-0.5\n-2.0\n");
        let f2 = write_fixture(&dir, "m2.probs", "-0.6\n");

        let err = read_prob_streams(&[f1, f2], false).unwrap_err();
        assert!(matches!(err, MixPplError::Alignment { line: 2 }));
    }

    #[test]
    fn test_format_error_carries_offending_token() {
        let dir = TempDir::new().unwrap();
        let f1 = write_fixture(&dir, "m1.probs", "-0.5 oops\n");
        let f2 = write_fixture(&dir, "m2.probs", "-0.6 -1.6\n");

        let err = read_prob_streams(&[f1, f2], false).unwrap_err();
        match err {
            MixPplError::Format { line, token } => {
                assert_eq!(line, 1);
                assert_eq!(token, "oops");
            }
            other => panic!("expected format error, got {other:?}"),
        }
    }

    #[test]
    fn test_non_finite_token_is_a_format_error() {
        let dir = TempDir::new().unwrap();
        let f1 = write_fixture(&dir, "m1.probs", "inf\n");
        let f2 = write_fixture(&dir, "m2.probs", "-0.6\n");

        assert!(read_prob_streams(&[f1, f2], false).is_err());
    }

    #[test]
    fn test_oov_without_crossover() {
        let dir = TempDir::new().unwrap();
        let f1 = write_fixture(&dir, "m1.probs", "-0.1 <unk>\n");
        let f2 = write_fixture(&dir, "m2.probs", "-0.1 -0.2\n");

        let corpus = read_prob_streams(&[f1, f2], false).unwrap();
        assert_eq!(corpus.num_unks, 1);
        assert_eq!(corpus.samples.len(), 1);
        assert_eq!(corpus.samples[0].as_slice(), &[-0.1, -0.1]);
    }

    #[test]
    fn test_oov_with_crossover_substitutes_fallback() {
        let dir = TempDir::new().unwrap();
        let f1 = write_fixture(&dir, "m1.probs", "-0.1 <unk>\n");
        let f2 = write_fixture(&dir, "m2.probs", "-0.1 -0.2\n");

        let corpus = read_prob_streams(&[f1, f2], true).unwrap();
        assert_eq!(corpus.num_unks, 0);
        assert_eq!(corpus.samples.len(), 2);
        assert_eq!(corpus.samples[1].as_slice(), &[FALLBACK_LOG_PROB, -0.2]);
    }

    #[test]
    fn test_all_unknown_position_rejected_even_with_crossover() {
        let dir = TempDir::new().unwrap();
        let f1 = write_fixture(&dir, "m1.probs", "<unk>\n");
        let f2 = write_fixture(&dir, "m2.probs", "<unk>\n");

        let corpus = read_prob_streams(&[f1, f2], true).unwrap();
        assert_eq!(corpus.num_unks, 1);
        assert!(corpus.samples.is_empty());
    }

    #[test]
    fn test_empty_lines_count_as_sentences_without_positions() {
        let dir = TempDir::new().unwrap();
        let f1 = write_fixture(&dir, "m1.probs", "-0.5\n\n-1.0\n");
        let f2 = write_fixture(&dir, "m2.probs", "-0.6\n\n-1.1\n");

        let corpus = read_prob_streams(&[f1, f2], false).unwrap();
        assert_eq!(corpus.num_sentences, 3);
        assert_eq!(corpus.samples.len(), 2);
    }

    #[test]
    fn test_gzip_input_matches_plain_read() {
        let dir = TempDir::new().unwrap();
        let contents = "-0.5 -1.5\n-2.0\n";
        let plain = write_fixture(&dir, "m.probs", contents);
        let gz = write_gz_fixture(&dir, "m.probs.gz", contents);

        let from_plain = read_prob_streams(&[plain], false).unwrap();
        let from_gz = read_prob_streams(&[gz], false).unwrap();
        assert_eq!(from_plain.samples, from_gz.samples);
        assert_eq!(from_plain.num_sentences, from_gz.num_sentences);
    }

    #[test]
    fn test_single_stream_read() {
        let dir = TempDir::new().unwrap();
        let f1 = write_fixture(&dir, "m1.probs", "-0.5 -1.5\n");
        let corpus = read_prob_streams(&[f1], false).unwrap();
        assert_eq!(corpus.samples.len(), 2);
        assert_eq!(corpus.samples[0].as_slice(), &[-0.5]);
    }

    #[test]
    fn test_no_paths_is_a_usage_error() {
        let paths: [PathBuf; 0] = [];
        assert!(matches!(
            read_prob_streams(&paths, false).unwrap_err(),
            MixPplError::Usage(_)
        ));
    }

    #[test]
    fn test_write_interpolated_keeps_line_shape() {
        let dir = TempDir::new().unwrap();
        let f1 = write_fixture(&dir, "m1.probs", "-0.5 <unk>\n\n-1.0\n");
        let f2 = write_fixture(&dir, "m2.probs", "-0.5 -0.2\n\n-1.0\n");
        let out = dir.path().join("mixed.probs");

        let weights = WeightVector::from_linear(vec![0.5, 0.5]).unwrap();
        write_interpolated(&[f1, f2], &out, &weights, false).unwrap();

        let written = fs::read_to_string(&out).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "");
        let first: Vec<&str> = lines[0].split_whitespace().collect();
        assert_eq!(first.len(), 2);
        assert_eq!(first[1], UNK_SYMBOL);
        // Equal-weight self-interpolation reproduces the input value
        let mixed: f64 = first[0].parse().unwrap();
        assert!((mixed - (-0.5)).abs() < 1e-4);
        let third: f64 = lines[2].parse().unwrap();
        assert!((third - (-1.0)).abs() < 1e-4);
    }

    #[test]
    fn test_write_interpolated_gzip_roundtrip() {
        let dir = TempDir::new().unwrap();
        let f1 = write_fixture(&dir, "m1.probs", "-0.5\n");
        let out = dir.path().join("mixed.probs.gz");

        let weights = WeightVector::from_linear(vec![1.0]).unwrap();
        write_interpolated(&[f1], &out, &weights, false).unwrap();

        let mut text = String::new();
        MultiGzDecoder::new(File::open(&out).unwrap())
            .read_to_string(&mut text)
            .unwrap();
        let value: f64 = text.trim().parse().unwrap();
        assert!((value - (-0.5)).abs() < 1e-4);
    }

    #[test]
    fn test_write_interpolated_weight_count_mismatch() {
        let dir = TempDir::new().unwrap();
        let f1 = write_fixture(&dir, "m1.probs", "-0.5\n");
        let out = dir.path().join("mixed.probs");
        let weights = WeightVector::from_linear(vec![0.5, 0.5]).unwrap();

        assert!(matches!(
            write_interpolated(&[f1], &out, &weights, false).unwrap_err(),
            MixPplError::Usage(_)
        ));
    }
}
