//! mixppl CLI
//!
//! Interpolates per-token log-probability streams written by independently
//! scored language models and reports corpus statistics.

use clap::{ArgGroup, Parser};
use env_logger::Env;
use mixppl::{
    optimize_weights, read_prob_streams, total_log_likelihood, write_interpolated, MixPplError,
    RunStatistics, WeightVector, DEFAULT_RESOLUTION,
};
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "mixppl")]
#[command(version)]
#[command(about = "Interpolates log likelihoods from aligned probability files")]
#[command(long_about = r#"
mixppl: log-domain interpolation of probability streams

Each input file carries one sentence per line and one token per corpus
position: a natural-log probability or the reserved unknown marker <unk>.
All files must be aligned line-for-line and token-for-token. Files ending
in .gz are decompressed transparently.

Supply fixed weights with --weights, or search the weight simplex with
--optimize-weights.
"#)]
#[command(group(ArgGroup::new("mode").required(true).args(["weights", "optimize_weights"])))]
struct Cli {
    /// Probability files written by a ppl scorer (.gz transparent)
    #[arg(required = true)]
    prob_files: Vec<PathBuf>,

    /// Fixed linear interpolation weights, comma-separated, summing to 1.0
    #[arg(short, long, value_delimiter = ',')]
    weights: Option<Vec<f64>>,

    /// Search the weight simplex for the best-scoring weights
    #[arg(short, long)]
    optimize_weights: bool,

    /// Simplex search resolution (grid units; 20 gives 0.05 steps for two models)
    #[arg(short, long, default_value_t = DEFAULT_RESOLUTION)]
    resolution: u32,

    /// Score positions known to at least one model, substituting an
    /// effectively-zero probability for the models that do not know them
    #[arg(short = 'u', long)]
    allow_unknown_crossover: bool,

    /// External word count for word-normalized perplexity
    #[arg(short, long)]
    num_words: Option<u64>,

    /// Write the interpolated log-probability stream here (fixed weights only)
    #[arg(short = 'f', long)]
    output_prob_file: Option<PathBuf>,

    /// Print statistics as JSON on stdout instead of the text report
    #[arg(long)]
    json: bool,
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> mixppl::Result<()> {
    if cli.output_prob_file.is_some() && cli.optimize_weights {
        return Err(MixPplError::Usage(
            "--output-prob-file requires fixed --weights".to_string(),
        ));
    }
    // Validate the full option set before touching any input file
    let fixed_weights = match cli.weights {
        Some(linear) => {
            if linear.len() != cli.prob_files.len() {
                return Err(MixPplError::Usage(format!(
                    "{} weights supplied for {} probability files",
                    linear.len(),
                    cli.prob_files.len()
                )));
            }
            Some(WeightVector::from_linear(linear)?)
        }
        None => None,
    };

    let corpus = read_prob_streams(&cli.prob_files, cli.allow_unknown_crossover)?;

    let (weights, total_ll) = match fixed_weights {
        Some(weights) => {
            let total_ll = total_log_likelihood(&corpus.samples, &weights.log_weights());
            (weights, total_ll)
        }
        None => optimize_weights(&corpus.samples, cli.prob_files.len(), cli.resolution)?,
    };

    let stats = RunStatistics::new(&corpus, &weights, total_ll, cli.num_words);
    if cli.json {
        println!("{}", stats.to_json()?);
    } else {
        eprint!("{stats}");
    }

    if let Some(out_path) = cli.output_prob_file {
        write_interpolated(
            &cli.prob_files,
            &out_path,
            &weights,
            cli.allow_unknown_crossover,
        )?;
    }

    Ok(())
}
