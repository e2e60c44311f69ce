//! Helpers shared by the command-line tools

use anyhow::{Context, Result};
use rayon::prelude::*;
use songmark_core::{
    open_backend, AudioSource, Error, FingerprintRecord, Recognizer, SongMetadata,
    SongmarkSettings,
};
use std::path::{Path, PathBuf};

use crate::output::{BatchOutput, IndexOutput};

/// Default settings file, looked up in the working directory
pub const DEFAULT_CONFIG: &str = "config.toml";

/// Logs go to stderr; without `--verbose` they are silenced so stdout stays
/// clean JSON
pub fn init_logger(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Off
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();
}

/// Load the settings file, or defaults if it does not exist
pub fn load_settings(config_path: &str) -> Result<SongmarkSettings> {
    let settings = SongmarkSettings::load_or_default(Path::new(config_path))
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;
    log::info!("Storage backend: {:?}", settings.storage.backend);
    Ok(settings)
}

/// Open the configured backend and build a recognizer on it
pub async fn open_recognizer(settings: &SongmarkSettings) -> Result<Recognizer> {
    let backend = open_backend(&settings.storage)
        .await
        .context("Failed to open storage backend")?;
    Ok(Recognizer::from_settings(backend, settings)?)
}

/// Song id derived from a file name (`music/abc123.wav` -> `abc123`)
pub fn song_id_from_path(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// WAV files directly inside `dir`, sorted by name
pub fn wav_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to list {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|s| s.to_str())
                    .map(|ext| ext.eq_ignore_ascii_case("wav"))
                    .unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files)
}

/// What happened to one song of a batch
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    Indexed(IndexOutput),
    /// Already in the index
    Skipped,
    /// Unreadable audio or nothing to index
    Failed,
}

/// Store the fingerprints computed for one song of a batch
///
/// Duplicates are skipped and bad input counts as a failure. Storage errors
/// are returned so the batch stops.
pub async fn store_batch_song(
    recognizer: &Recognizer,
    song_id: &str,
    path: &Path,
    records: songmark_core::Result<Vec<FingerprintRecord>>,
) -> Result<BatchOutcome> {
    let records = match records {
        Ok(records) => records,
        Err(e) => {
            log::error!("Failed to fingerprint {}: {}", path.display(), e);
            return Ok(BatchOutcome::Failed);
        }
    };

    match recognizer.store(song_id, &records).await {
        Ok(0) => Ok(BatchOutcome::Failed),
        Ok(written) => {
            recognizer
                .index()
                .put_song(&SongMetadata::new(song_id, song_id))
                .await
                .with_context(|| format!("Failed to store metadata of {}", song_id))?;
            Ok(BatchOutcome::Indexed(IndexOutput {
                song_id: song_id.to_string(),
                path: path.display().to_string(),
                records: written,
            }))
        }
        Err(e @ Error::DuplicateSong(_)) => {
            log::warn!("Skipping {}: {}", song_id, e);
            Ok(BatchOutcome::Skipped)
        }
        Err(e) if e.is_input_error() => {
            log::error!("Failed to index {}: {}", song_id, e);
            Ok(BatchOutcome::Failed)
        }
        Err(e) => Err(e).with_context(|| format!("Failed to store {}", song_id)),
    }
}

/// Index every WAV file of `dir` under its file stem
///
/// Files are fingerprinted in parallel and stored one at a time.
pub async fn index_directory(recognizer: &Recognizer, dir: &Path) -> Result<BatchOutput> {
    let files = wav_files(dir)?;
    log::info!("Found {} WAV files in {}", files.len(), dir.display());

    let mut summary = BatchOutput::default();

    // Already indexed songs are skipped before the expensive part
    let mut pending = Vec::new();
    for path in files {
        let Some(song_id) = song_id_from_path(&path) else {
            log::warn!("Skipping {}: no usable file name", path.display());
            summary.failed += 1;
            continue;
        };
        if recognizer.index().contains_song(&song_id).await? {
            log::info!("Skipping {} (already indexed)", song_id);
            summary.skipped += 1;
            continue;
        }
        pending.push((song_id, path));
    }

    let start = std::time::Instant::now();
    let fingerprinter = recognizer.fingerprinter();
    let fingerprinted: Vec<_> = pending
        .par_iter()
        .map(|(song_id, path)| {
            let records = fingerprinter.records(AudioSource::Path(path), song_id);
            (song_id, path, records)
        })
        .collect();
    log::info!(
        "Fingerprinted {} files in {:.2}s",
        fingerprinted.len(),
        start.elapsed().as_secs_f64()
    );

    for (song_id, path, records) in fingerprinted {
        let outcome = store_batch_song(recognizer, song_id, path, records).await?;
        summary.record(outcome);
    }

    log::info!(
        "Indexed {} songs ({} records), skipped {}, failed {}",
        summary.indexed,
        summary.records,
        summary.skipped,
        summary.failed
    );
    Ok(summary)
}
