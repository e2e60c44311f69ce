//! smmigrate - copy an index from one backend to another
//!
//! Usage:
//!   smmigrate --source-config config.toml --dest-config config.postgresql.toml

use anyhow::{Context, Result};
use clap::Parser;
use songmark_cli::common::load_settings;
use songmark_core::{open_backend, StorageBackend};

#[derive(Parser, Debug)]
#[command(name = "smmigrate")]
#[command(
    about = "Copy fingerprints and song metadata between storage backends",
    long_about = None
)]
struct Args {
    /// Source configuration file
    #[arg(long)]
    source_config: String,

    /// Destination configuration file
    #[arg(long)]
    dest_config: String,

    /// Dry run - show what would be migrated without actually migrating
    #[arg(long)]
    dry_run: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Default)]
struct MigrationStats {
    migrated: usize,
    skipped: usize,
    failed: usize,
    records: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let source_settings = load_settings(&args.source_config)?;
    let dest_settings = load_settings(&args.dest_config)?;

    log::info!(
        "Source: {:?} backend from '{}'",
        source_settings.storage.backend,
        args.source_config
    );
    log::info!(
        "Destination: {:?} backend from '{}'",
        dest_settings.storage.backend,
        args.dest_config
    );

    let source = open_backend(&source_settings.storage)
        .await
        .context("Failed to open source backend")?;
    let dest = open_backend(&dest_settings.storage)
        .await
        .context("Failed to open destination backend")?;

    let stats = migrate(source.as_ref(), dest.as_ref(), args.dry_run).await?;

    log::info!(
        "Migration finished: {} migrated ({} records), {} skipped, {} failed",
        stats.migrated,
        stats.records,
        stats.skipped,
        stats.failed
    );

    if stats.failed > 0 {
        anyhow::bail!("{} songs failed to migrate", stats.failed);
    }
    Ok(())
}

async fn migrate(
    source: &dyn StorageBackend,
    dest: &dyn StorageBackend,
    dry_run: bool,
) -> Result<MigrationStats> {
    let song_ids = source
        .song_ids()
        .await
        .context("Failed to list songs in source")?;
    log::info!("Found {} songs to migrate", song_ids.len());

    let mut stats = MigrationStats::default();

    for song_id in song_ids {
        if dest.contains_song(&song_id).await? {
            log::debug!("Skipping '{}' (already in destination)", song_id);
            stats.skipped += 1;
            continue;
        }

        let records = source
            .records_for_song(&song_id)
            .await
            .with_context(|| format!("Failed to read records of '{}'", song_id))?;
        let metadata = source.get_song(&song_id).await?;

        if dry_run {
            log::info!("[DRY RUN] Would migrate '{}' ({} records)", song_id, records.len());
            stats.migrated += 1;
            stats.records += records.len();
            continue;
        }

        match dest.write_batch(&song_id, &records).await {
            Ok(()) => {
                if let Some(metadata) = &metadata {
                    dest.put_song(metadata).await?;
                }
                log::info!("Migrated '{}' ({} records)", song_id, records.len());
                stats.migrated += 1;
                stats.records += records.len();
            }
            Err(e) => {
                log::error!("Failed to migrate '{}': {}", song_id, e);
                stats.failed += 1;
            }
        }
    }

    Ok(stats)
}
