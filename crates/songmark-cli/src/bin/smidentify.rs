//! smidentify - identify a recording against the index
//!
//! Usage: smidentify [--config <path>] [--min-votes <n>] [--ratio <r>] <audio.wav>

use anyhow::{Context, Result};
use clap::Parser;
use songmark_cli::common::{init_logger, load_settings, open_recognizer, DEFAULT_CONFIG};
use songmark_cli::output::{print_json, IdentifyOutput};
use songmark_core::AudioSource;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "smidentify")]
#[command(about = "Identify a recording against the song index", long_about = None)]
struct Args {
    /// Query WAV file
    audio_path: PathBuf,

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

    let start = std::time::Instant::now();
    let result = recognizer
        .identify_song(AudioSource::Path(&args.audio_path))
        .await
        .with_context(|| format!("Failed to identify {}", args.audio_path.display()))?;
    log::info!("Identification took {:.2}s", start.elapsed().as_secs_f64());

    let song = match &result.song_id {
        Some(song_id) => recognizer.song_metadata(song_id).await?,
        None => None,
    };

    print_json(&IdentifyOutput {
        query_path: args.audio_path.display().to_string(),
        result,
        song,
    });

    Ok(())
}
