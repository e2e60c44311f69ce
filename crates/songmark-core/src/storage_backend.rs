//! Storage backend traits and implementations
//!
//! Fingerprint records and song metadata live behind two async traits so the
//! matcher and the CLI tools work the same against memory, the filesystem or
//! PostgreSQL. Backends are built from [`StorageConfig`] and shared as
//! `Arc<dyn StorageBackend>`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::hashing::{FingerprintRecord, HashKey};
use crate::storage_config::{BackendKind, StorageConfig};

mod filesystem;
mod memory;
mod postgres;

pub use filesystem::FilesystemBackend;
pub use memory::MemoryBackend;
pub use postgres::PostgresqlBackend;

/// Catalog metadata for an indexed song
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SongMetadata {
    pub song_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_art: Option<String>,
}

impl SongMetadata {
    pub fn new(song_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            song_id: song_id.into(),
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Fingerprint record store
#[async_trait]
pub trait FingerprintIndex: Send + Sync {
    /// Store all records of one song; either every record becomes visible or none
    async fn write_batch(&self, song_id: &str, records: &[FingerprintRecord]) -> Result<()>;

    /// All records whose hash is in `keys`, in no particular order
    async fn lookup_many(&self, keys: &HashSet<HashKey>) -> Result<Vec<FingerprintRecord>>;

    /// Records for a single hash
    async fn lookup(&self, key: &HashKey) -> Result<Vec<FingerprintRecord>> {
        let keys: HashSet<HashKey> = std::iter::once(*key).collect();
        self.lookup_many(&keys).await
    }

    /// Whether records for `song_id` have been written
    async fn contains_song(&self, song_id: &str) -> Result<bool>;

    /// Remove every record of a song, returning how many were removed
    async fn delete_song(&self, song_id: &str) -> Result<usize>;

    /// Identifiers of all indexed songs
    async fn song_ids(&self) -> Result<Vec<String>>;

    async fn records_for_song(&self, song_id: &str) -> Result<Vec<FingerprintRecord>>;

    /// Total number of stored records
    async fn record_count(&self) -> Result<usize>;
}

/// Song metadata store
#[async_trait]
pub trait SongStore: Send + Sync {
    /// Insert or replace the metadata of a song
    async fn put_song(&self, metadata: &SongMetadata) -> Result<()>;

    async fn get_song(&self, song_id: &str) -> Result<Option<SongMetadata>>;
}

/// A backend holding both fingerprints and song metadata
pub trait StorageBackend: FingerprintIndex + SongStore {}

impl<T: FingerprintIndex + SongStore + ?Sized> StorageBackend for T {}

/// Reject batches carrying records of another song
pub(crate) fn check_batch(song_id: &str, records: &[FingerprintRecord]) -> Result<()> {
    match records.iter().find(|r| r.song_id != song_id) {
        Some(record) => Err(Error::MismatchedRecord {
            expected: song_id.to_string(),
            found: record.song_id.clone(),
        }),
        None => Ok(()),
    }
}

/// Build the backend selected by `config`
pub async fn open_backend(config: &StorageConfig) -> Result<Arc<dyn StorageBackend>> {
    let backend: Arc<dyn StorageBackend> = match config.backend {
        BackendKind::Memory => Arc::new(MemoryBackend::new()),
        BackendKind::Filesystem => Arc::new(FilesystemBackend::new(&config.filesystem)),
        BackendKind::Postgresql => Arc::new(PostgresqlBackend::new(&config.postgresql).await?),
    };
    log::debug!("Opened {:?} storage backend", config.backend);
    Ok(backend)
}
