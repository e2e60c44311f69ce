//! Filesystem backend
//!
//! Layout under the base directory:
//!
//! ```text
//! fingerprints/<song>.json|bson   one fingerprint file per song
//! songs/<song>.json               song metadata
//! ```
//!
//! Song ids are escaped into file names (`[A-Za-z0-9_-]` kept, every other
//! byte written as `%XX`). Fingerprint files are published with a rename so a
//! half-written song is never read.

use anyhow::Context;
use async_trait::async_trait;
use rayon::prelude::*;
use songmark_fp::{FpEncoding, FpJsonFile, FpJsonRecord};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::{check_batch, FingerprintIndex, SongMetadata, SongStore};
use crate::error::{Error, Result};
use crate::hashing::{FingerprintRecord, HashKey};
use crate::storage_config::{FileFormat, FilesystemConfig};

const FINGERPRINT_DIR: &str = "fingerprints";
const SONG_DIR: &str = "songs";

/// Filesystem-based storage backend
pub struct FilesystemBackend {
    base_dir: PathBuf,
    format: FileFormat,
}

impl FilesystemBackend {
    /// Create a new filesystem backend
    pub fn new(config: &FilesystemConfig) -> Self {
        Self::from_path(&config.base_directory, config.format)
    }

    /// Create from directory path and format
    pub fn from_path(base_dir: impl AsRef<Path>, format: FileFormat) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
            format,
        }
    }

    /// Encoding used for new files
    fn write_encoding(&self) -> FpEncoding {
        match self.format {
            FileFormat::Bson => FpEncoding::Bson,
            FileFormat::Json | FileFormat::Auto => FpEncoding::Json,
        }
    }

    /// Encodings accepted when reading
    fn read_encodings(&self) -> &'static [FpEncoding] {
        match self.format {
            FileFormat::Json => &[FpEncoding::Json],
            FileFormat::Bson => &[FpEncoding::Bson],
            FileFormat::Auto => &[FpEncoding::Json, FpEncoding::Bson],
        }
    }

    fn fingerprint_dir(&self) -> PathBuf {
        self.base_dir.join(FINGERPRINT_DIR)
    }

    fn song_path(&self, song_id: &str) -> PathBuf {
        self.base_dir
            .join(SONG_DIR)
            .join(format!("{}.json", escape_song_id(song_id)))
    }

    /// Find the fingerprint file of a song, if any
    fn find_file(&self, song_id: &str) -> Option<PathBuf> {
        let stem = escape_song_id(song_id);
        self.read_encodings()
            .iter()
            .map(|enc| {
                self.fingerprint_dir()
                    .join(format!("{}.{}", stem, enc.extension()))
            })
            .find(|path| path.exists())
    }

    /// All published fingerprint files
    fn list_files(&self) -> Result<Vec<PathBuf>> {
        let dir = self.fingerprint_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let accepted = self.read_encodings();
        let entries = std::fs::read_dir(&dir)
            .with_context(|| format!("Failed to list {}", dir.display()))?;
        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                FpEncoding::from_path(path)
                    .map(|enc| accepted.contains(&enc))
                    .unwrap_or(false)
            })
            .collect();
        files.sort();
        Ok(files)
    }

    fn load_records(path: &Path) -> Result<Vec<FingerprintRecord>> {
        let fp_file = FpJsonFile::load_auto(path)?;
        to_records(fp_file)
    }
}

fn to_records(fp_file: FpJsonFile) -> Result<Vec<FingerprintRecord>> {
    let song_id = fp_file.metadata.song_id;
    fp_file
        .records
        .into_iter()
        .map(|record| -> Result<FingerprintRecord> {
            Ok(FingerprintRecord::new(
                record.hash.parse::<HashKey>()?,
                song_id.as_str(),
                record.t_anchor,
            ))
        })
        .collect()
}

#[async_trait]
impl FingerprintIndex for FilesystemBackend {
    async fn write_batch(&self, song_id: &str, records: &[FingerprintRecord]) -> Result<()> {
        check_batch(song_id, records)?;
        if records.is_empty() {
            return Ok(());
        }
        if self.find_file(song_id).is_some() {
            return Err(Error::DuplicateSong(song_id.to_string()));
        }

        let mut fp_file = FpJsonFile::new(song_id.to_string());
        fp_file.extend_records(records.iter().map(|r| FpJsonRecord {
            hash: r.hash.to_string(),
            t_anchor: r.t_anchor,
        }));

        let encoding = self.write_encoding();
        let dir = self.fingerprint_dir();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        let path = dir.join(format!(
            "{}.{}",
            escape_song_id(song_id),
            encoding.extension()
        ));
        fp_file.publish(&path, encoding)?;

        log::debug!("Wrote {} records to {}", records.len(), path.display());
        Ok(())
    }

    async fn lookup_many(&self, keys: &HashSet<HashKey>) -> Result<Vec<FingerprintRecord>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let files = self.list_files()?;
        let per_file: Vec<Vec<FingerprintRecord>> = files
            .par_iter()
            .map(|path| -> Result<Vec<FingerprintRecord>> {
                let mut records = Self::load_records(path)?;
                records.retain(|r| keys.contains(&r.hash));
                Ok(records)
            })
            .collect::<Result<_>>()?;

        Ok(per_file.into_iter().flatten().collect())
    }

    async fn contains_song(&self, song_id: &str) -> Result<bool> {
        Ok(self.find_file(song_id).is_some())
    }

    async fn delete_song(&self, song_id: &str) -> Result<usize> {
        let Some(path) = self.find_file(song_id) else {
            return Ok(0);
        };
        let removed = FpJsonFile::load_auto(&path)?.records.len();
        std::fs::remove_file(&path)
            .with_context(|| format!("Failed to remove {}", path.display()))?;
        Ok(removed)
    }

    async fn song_ids(&self) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self
            .list_files()?
            .iter()
            .filter_map(|path| path.file_stem().and_then(|s| s.to_str()))
            .filter_map(unescape_song_id)
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    async fn records_for_song(&self, song_id: &str) -> Result<Vec<FingerprintRecord>> {
        match self.find_file(song_id) {
            Some(path) => Self::load_records(&path),
            None => Ok(Vec::new()),
        }
    }

    async fn record_count(&self) -> Result<usize> {
        let files = self.list_files()?;
        let counts = files
            .par_iter()
            .map(|path| -> Result<usize> { Ok(FpJsonFile::load_auto(path)?.metadata.num_records) })
            .collect::<Result<Vec<usize>>>()?;
        Ok(counts.into_iter().sum())
    }
}

#[async_trait]
impl SongStore for FilesystemBackend {
    async fn put_song(&self, metadata: &SongMetadata) -> Result<()> {
        let path = self.song_path(&metadata.song_id);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json =
            serde_json::to_string_pretty(metadata).context("Failed to encode song metadata")?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    async fn get_song(&self, song_id: &str) -> Result<Option<SongMetadata>> {
        let path = self.song_path(song_id);
        if !path.exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let metadata = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(Some(metadata))
    }
}

/// File-name-safe form of a song id
fn escape_song_id(song_id: &str) -> String {
    let mut out = String::with_capacity(song_id.len());
    for byte in song_id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

fn unescape_song_id(stem: &str) -> Option<String> {
    let bytes = stem.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = stem.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}
