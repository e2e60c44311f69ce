//! JSON/BSON fingerprint file format
//!
//! One file per indexed song: a metadata header followed by the flat list of
//! `(hash, t_anchor)` records generated for that song. Record fields use the
//! same names as the database schema so files can be migrated verbatim.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Current file format version
pub const FORMAT_VERSION: &str = "1.0";

/// Algorithm identifier written into every file
pub const ALGORITHM_ID: &str = "LANDMARK_PAIRS";

/// Errors specific to the file format (I/O and codec errors go through anyhow)
#[derive(Debug, thiserror::Error)]
pub enum FpError {
    #[error("unrecognised fingerprint file extension: {0}")]
    UnknownExtension(PathBuf),
    #[error("fingerprint file {path} declares {declared} records but holds {actual}")]
    RecordCountMismatch {
        path: PathBuf,
        declared: usize,
        actual: usize,
    },
}

/// On-disk encoding of a fingerprint file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FpEncoding {
    Json,
    Bson,
}

impl FpEncoding {
    /// File extension used for this encoding
    pub fn extension(&self) -> &'static str {
        match self {
            FpEncoding::Json => "json",
            FpEncoding::Bson => "bson",
        }
    }

    /// Detect encoding from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Some(FpEncoding::Json),
            Some("bson") => Some(FpEncoding::Bson),
            _ => None,
        }
    }
}

/// Complete fingerprint file for one song
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FpJsonFile {
    pub version: String,
    pub metadata: FpJsonMetadata,
    pub records: Vec<FpJsonRecord>,
}

/// Header identifying the song and the hash scheme of the records
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FpJsonMetadata {
    pub song_id: String,
    pub algorithm: String,
    pub num_records: usize,
    pub created_at: String,
}

/// A single stored landmark
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FpJsonRecord {
    /// Hash string in `"{f1_bin}_{f2_bin}_{dt_bin}"` form
    pub hash: String,
    /// Anchor time in seconds
    pub t_anchor: f64,
}

impl FpJsonFile {
    /// Create an empty file for a song
    pub fn new(song_id: String) -> Self {
        Self {
            version: FORMAT_VERSION.to_string(),
            metadata: FpJsonMetadata {
                song_id,
                algorithm: ALGORITHM_ID.to_string(),
                num_records: 0,
                created_at: chrono::Utc::now().to_rfc3339(),
            },
            records: Vec::new(),
        }
    }

    /// Append records, keeping the header count in sync
    pub fn extend_records<I>(&mut self, records: I)
    where
        I: IntoIterator<Item = FpJsonRecord>,
    {
        self.records.extend(records);
        self.metadata.num_records = self.records.len();
    }

    /// Save to JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let json_str = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json_str)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// Save to BSON file
    pub fn save_bson(&self, path: &Path) -> Result<()> {
        let bytes = bson::to_vec(self).context("Failed to encode fingerprint file as BSON")?;
        std::fs::write(path, bytes)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// Save using the given encoding
    pub fn save_as(&self, path: &Path, encoding: FpEncoding) -> Result<()> {
        match encoding {
            FpEncoding::Json => self.save(path),
            FpEncoding::Bson => self.save_bson(path),
        }
    }

    /// Write to a temporary sibling and rename it over `path`.
    ///
    /// Readers that only open files with a known extension never observe a
    /// partially written file.
    pub fn publish(&self, path: &Path, encoding: FpEncoding) -> Result<()> {
        let tmp_path = temp_path_for(path);
        let published = self.save_as(&tmp_path, encoding).and_then(|()| {
            std::fs::rename(&tmp_path, path).with_context(|| {
                format!(
                    "Failed to publish {} as {}",
                    tmp_path.display(),
                    path.display()
                )
            })
        });
        if published.is_err() {
            // Drop a partially written temp file
            let _ = std::fs::remove_file(&tmp_path);
        }
        published
    }

    /// Load from JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let json_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let fp_file: FpJsonFile = serde_json::from_str(&json_str)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        fp_file.check(path)?;
        Ok(fp_file)
    }

    /// Load from BSON file
    pub fn load_bson(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let fp_file: FpJsonFile = bson::from_slice(&bytes)
            .with_context(|| format!("Failed to decode {}", path.display()))?;
        fp_file.check(path)?;
        Ok(fp_file)
    }

    /// Load a file, choosing the decoder from its extension
    pub fn load_auto(path: &Path) -> Result<Self> {
        match FpEncoding::from_path(path) {
            Some(FpEncoding::Json) => Self::load(path),
            Some(FpEncoding::Bson) => Self::load_bson(path),
            None => Err(FpError::UnknownExtension(path.to_path_buf()).into()),
        }
    }

    fn check(&self, path: &Path) -> Result<()> {
        if self.metadata.num_records != self.records.len() {
            return Err(FpError::RecordCountMismatch {
                path: path.to_path_buf(),
                declared: self.metadata.num_records,
                actual: self.records.len(),
            }
            .into());
        }
        Ok(())
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_file() -> FpJsonFile {
        let mut file = FpJsonFile::new("song-1".to_string());
        file.extend_records(vec![
            FpJsonRecord {
                hash: "10_12_3".to_string(),
                t_anchor: 0.25,
            },
            FpJsonRecord {
                hash: "10_15_7".to_string(),
                t_anchor: 1.5,
            },
        ]);
        file
    }

    #[test]
    fn test_encoding_from_path() {
        assert_eq!(FpEncoding::from_path(Path::new("x.json")), Some(FpEncoding::Json));
        assert_eq!(FpEncoding::from_path(Path::new("x.bson")), Some(FpEncoding::Bson));
        assert_eq!(FpEncoding::from_path(Path::new("x.json.tmp")), None);
    }

    #[test]
    fn test_publish_and_load_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("song-1.json");
        let file = sample_file();

        file.publish(&path, FpEncoding::Json).unwrap();
        assert!(!dir.path().join("song-1.json.tmp").exists());

        let loaded = FpJsonFile::load_auto(&path).unwrap();
        assert_eq!(loaded.metadata.song_id, "song-1");
        assert_eq!(loaded.metadata.num_records, 2);
        assert_eq!(loaded.records, file.records);
    }

    #[test]
    fn test_publish_and_load_bson() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("song-1.bson");
        sample_file().publish(&path, FpEncoding::Bson).unwrap();

        let loaded = FpJsonFile::load_auto(&path).unwrap();
        assert_eq!(loaded.records.len(), 2);
        assert_eq!(loaded.records[1].hash, "10_15_7");
    }

    #[test]
    fn test_failed_publish_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("song-1.json");
        // A non-empty directory cannot be replaced by a file
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("keep"), b"").unwrap();

        assert!(sample_file().publish(&path, FpEncoding::Json).is_err());
        assert!(!dir.path().join("song-1.json.tmp").exists());
        assert!(path.join("keep").exists());
    }

    #[test]
    fn test_record_count_mismatch_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        let mut file = sample_file();
        file.metadata.num_records = 5;
        file.save(&path).unwrap();

        assert!(FpJsonFile::load(&path).is_err());
    }
}
