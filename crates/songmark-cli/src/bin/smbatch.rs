//! smbatch - index every WAV file of a directory
//!
//! Files are fingerprinted in parallel; each song id is the file name
//! without extension.
//!
//! Usage: smbatch [--config <path>] <music_dir>

use anyhow::Result;
use clap::Parser;
use songmark_cli::common::{
    index_directory, init_logger, load_settings, open_recognizer, DEFAULT_CONFIG,
};
use songmark_cli::output::print_json;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "smbatch")]
#[command(about = "Index every WAV file in a directory", long_about = None)]
struct Args {
    /// Directory containing WAV files
    music_dir: PathBuf,

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

    let settings = load_settings(&args.config)?;
    let recognizer = open_recognizer(&settings).await?;

    let summary = index_directory(&recognizer, &args.music_dir).await?;
    print_json(&summary);

    Ok(())
}
