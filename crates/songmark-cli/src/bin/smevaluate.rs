//! smevaluate - measure recognition accuracy on labelled clips
//!
//! Every WAV under `<eval_dir>/<song_id>/` is identified and compared with
//! the directory it sits in. `--known-dir` indexes a directory of reference
//! songs first, the same way `smbatch` does.
//!
//! Usage: smevaluate [--known-dir <dir>] [--min-votes <n>] [--ratio <r>] <eval_dir>

use anyhow::Result;
use clap::Parser;
use songmark_cli::common::{
    index_directory, init_logger, load_settings, open_recognizer, DEFAULT_CONFIG,
};
use songmark_cli::evaluation::{evaluate, labelled_queries};
use songmark_cli::output::print_json;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "smevaluate")]
#[command(about = "Report recognition accuracy over labelled query clips", long_about = None)]
struct Args {
    /// Directory with one subdirectory of clips per song id
    eval_dir: PathBuf,

    /// Index the WAV files of this directory before evaluating
    #[arg(long)]
    known_dir: Option<PathBuf>,

    /// Minimum votes at one offset for a match (overrides the config)
    #[arg(long)]
    min_votes: Option<u32>,

    /// Required ratio between best and runner-up song (overrides the config)
    #[arg(long)]
    ratio: Option<f64>,

    /// Path to configuration file (TOML)
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logger(args.verbose);

    let mut settings = load_settings(&args.config)?;
    if let Some(min_votes) = args.min_votes {
        settings.matching.min_vote_threshold = min_votes;
    }
    if let Some(ratio) = args.ratio {
        settings.matching.ratio_threshold = ratio;
    }

    let recognizer = open_recognizer(&settings).await?;

    if let Some(known_dir) = &args.known_dir {
        let indexed = index_directory(&recognizer, known_dir).await?;
        log::info!(
            "Reference songs: {} indexed, {} already present, {} failed",
            indexed.indexed,
            indexed.skipped,
            indexed.failed
        );
    }

    let queries = labelled_queries(&args.eval_dir)?;
    log::info!("Evaluating {} queries", queries.len());

    let start = std::time::Instant::now();
    let summary = evaluate(&recognizer, &queries).await?;
    log::info!(
        "Accuracy {:.3} ({} of {}) in {:.2}s",
        summary.accuracy,
        summary.true_positives,
        summary.total_queries,
        start.elapsed().as_secs_f64()
    );

    print_json(&summary);
    Ok(())
}
