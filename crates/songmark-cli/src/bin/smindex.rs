//! smindex - fingerprint a WAV file and add it to the index
//!
//! Usage: smindex [--config <path>] <audio.wav> [--song-id <id>] [--title <title>] ...

use anyhow::{Context, Result};
use clap::Parser;
use songmark_cli::common::{
    init_logger, load_settings, open_recognizer, song_id_from_path, DEFAULT_CONFIG,
};
use songmark_cli::output::{print_json, IndexOutput};
use songmark_core::{AudioSource, SongMetadata};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "smindex")]
#[command(about = "Fingerprint a song and store it in the index", long_about = None)]
struct Args {
    /// Input WAV file
    audio_path: PathBuf,

    /// Song identifier (defaults to the file name without extension)
    #[arg(long)]
    song_id: Option<String>,

    /// Song title (defaults to the song identifier)
    #[arg(long)]
    title: Option<String>,

    #[arg(long)]
    artist: Option<String>,

    #[arg(long)]
    album_name: Option<String>,

    #[arg(long)]
    album_url: Option<String>,

    #[arg(long)]
    catalog_url: Option<String>,

    /// Cover art URL
    #[arg(long)]
    cover_art: Option<String>,

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

    let song_id = match &args.song_id {
        Some(id) => id.clone(),
        None => song_id_from_path(&args.audio_path)
            .context("Cannot derive a song id from the file name, pass --song-id")?,
    };

    let metadata = SongMetadata {
        song_id: song_id.clone(),
        title: args.title.clone().unwrap_or_else(|| song_id.clone()),
        artist: args.artist.clone(),
        album_name: args.album_name.clone(),
        album_url: args.album_url.clone(),
        catalog_url: args.catalog_url.clone(),
        cover_art: args.cover_art.clone(),
    };

    let settings = load_settings(&args.config)?;
    let recognizer = open_recognizer(&settings).await?;

    log::info!("Indexing {} as {}", args.audio_path.display(), song_id);
    let start = std::time::Instant::now();
    let records = recognizer
        .index_song_with_metadata(AudioSource::Path(&args.audio_path), &metadata)
        .await
        .with_context(|| format!("Failed to index {}", args.audio_path.display()))?;
    log::info!(
        "Stored {} records in {:.2}s",
        records,
        start.elapsed().as_secs_f64()
    );

    print_json(&IndexOutput {
        song_id,
        path: args.audio_path.display().to_string(),
        records,
    });

    Ok(())
}
