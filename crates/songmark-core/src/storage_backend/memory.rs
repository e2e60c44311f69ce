//! In-memory backend

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::RwLock;

use super::{check_batch, FingerprintIndex, SongMetadata, SongStore};
use crate::error::{Error, Result};
use crate::hashing::{FingerprintRecord, HashKey};

#[derive(Debug, Default)]
struct MemoryState {
    /// hash -> (song_id, t_anchor)
    postings: HashMap<HashKey, Vec<(String, f64)>>,
    /// Records per song, in write order
    songs: BTreeMap<String, Vec<FingerprintRecord>>,
    metadata: HashMap<String, SongMetadata>,
}

/// Process-local index guarded by a single lock
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: RwLock<MemoryState>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FingerprintIndex for MemoryBackend {
    async fn write_batch(&self, song_id: &str, records: &[FingerprintRecord]) -> Result<()> {
        check_batch(song_id, records)?;
        if records.is_empty() {
            return Ok(());
        }

        let mut state = self.state.write().await;
        if state.songs.contains_key(song_id) {
            return Err(Error::DuplicateSong(song_id.to_string()));
        }
        for record in records {
            state
                .postings
                .entry(record.hash)
                .or_default()
                .push((record.song_id.clone(), record.t_anchor));
        }
        state.songs.insert(song_id.to_string(), records.to_vec());

        log::debug!("Stored {} records for {}", records.len(), song_id);
        Ok(())
    }

    async fn lookup_many(&self, keys: &HashSet<HashKey>) -> Result<Vec<FingerprintRecord>> {
        let state = self.state.read().await;
        let mut found = Vec::new();
        for key in keys {
            if let Some(postings) = state.postings.get(key) {
                found.extend(postings.iter().map(|(song_id, t_anchor)| {
                    FingerprintRecord::new(*key, song_id.as_str(), *t_anchor)
                }));
            }
        }
        Ok(found)
    }

    async fn contains_song(&self, song_id: &str) -> Result<bool> {
        Ok(self.state.read().await.songs.contains_key(song_id))
    }

    async fn delete_song(&self, song_id: &str) -> Result<usize> {
        let mut state = self.state.write().await;
        let Some(records) = state.songs.remove(song_id) else {
            return Ok(0);
        };

        let hashes: HashSet<HashKey> = records.iter().map(|r| r.hash).collect();
        for hash in hashes {
            let emptied = match state.postings.get_mut(&hash) {
                Some(postings) => {
                    postings.retain(|(id, _)| id != song_id);
                    postings.is_empty()
                }
                None => false,
            };
            if emptied {
                state.postings.remove(&hash);
            }
        }

        Ok(records.len())
    }

    async fn song_ids(&self) -> Result<Vec<String>> {
        Ok(self.state.read().await.songs.keys().cloned().collect())
    }

    async fn records_for_song(&self, song_id: &str) -> Result<Vec<FingerprintRecord>> {
        Ok(self
            .state
            .read()
            .await
            .songs
            .get(song_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn record_count(&self) -> Result<usize> {
        Ok(self.state.read().await.songs.values().map(Vec::len).sum())
    }
}

#[async_trait]
impl SongStore for MemoryBackend {
    async fn put_song(&self, metadata: &SongMetadata) -> Result<()> {
        self.state
            .write()
            .await
            .metadata
            .insert(metadata.song_id.clone(), metadata.clone());
        Ok(())
    }

    async fn get_song(&self, song_id: &str) -> Result<Option<SongMetadata>> {
        Ok(self.state.read().await.metadata.get(song_id).cloned())
    }
}
