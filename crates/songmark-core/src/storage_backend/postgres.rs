//! PostgreSQL backend

use async_trait::async_trait;
use songmark_db::{DbError, NewFingerprint, NewSong};
use std::collections::HashSet;

use super::{check_batch, FingerprintIndex, SongMetadata, SongStore};
use crate::error::{Error, Result};
use crate::hashing::{FingerprintRecord, HashKey};
use crate::storage_config::PostgresqlConfig;

/// PostgreSQL-based storage backend
pub struct PostgresqlBackend {
    pool: deadpool_postgres::Pool,
}

impl PostgresqlBackend {
    /// Connect, verify the connection and make sure the schema exists
    pub async fn new(config: &PostgresqlConfig) -> Result<Self> {
        let pool = songmark_db::create_pool(
            &config.host,
            config.port,
            &config.database,
            &config.user,
            &config.password,
            config.max_connections,
        )?;

        songmark_db::test_connection(&pool).await?;
        songmark_db::apply_schema(&pool).await?;

        Ok(Self { pool })
    }

    /// Wrap an existing pool; the schema must already be applied
    pub fn from_pool(pool: deadpool_postgres::Pool) -> Self {
        Self { pool }
    }
}

fn to_record(fp: songmark_db::Fingerprint) -> Result<FingerprintRecord> {
    Ok(FingerprintRecord::new(
        fp.hash.parse::<HashKey>()?,
        fp.song_id,
        fp.t_anchor,
    ))
}

#[async_trait]
impl FingerprintIndex for PostgresqlBackend {
    async fn write_batch(&self, song_id: &str, records: &[FingerprintRecord]) -> Result<()> {
        check_batch(song_id, records)?;
        if records.is_empty() {
            return Ok(());
        }

        let db_fingerprints: Vec<NewFingerprint> = records
            .iter()
            .map(|r| NewFingerprint {
                hash: r.hash.to_string(),
                song_id: r.song_id.clone(),
                t_anchor: r.t_anchor,
            })
            .collect();

        if let Err(e) =
            songmark_db::insert_fingerprints_batch(&self.pool, song_id, &db_fingerprints).await
        {
            if let Some(DbError::DuplicateSong(id)) = e.downcast_ref::<DbError>() {
                return Err(Error::DuplicateSong(id.clone()));
            }
            return Err(e.into());
        }
        Ok(())
    }

    async fn lookup_many(&self, keys: &HashSet<HashKey>) -> Result<Vec<FingerprintRecord>> {
        let hashes: Vec<String> = keys.iter().map(HashKey::to_string).collect();
        let rows = songmark_db::get_fingerprints_by_hashes(&self.pool, &hashes).await?;

        log::trace!("{} hashes matched {} rows", hashes.len(), rows.len());

        rows.into_iter().map(to_record).collect()
    }

    async fn contains_song(&self, song_id: &str) -> Result<bool> {
        Ok(songmark_db::song_is_fingerprinted(&self.pool, song_id).await?)
    }

    async fn delete_song(&self, song_id: &str) -> Result<usize> {
        Ok(songmark_db::delete_song_fingerprints(&self.pool, song_id).await? as usize)
    }

    async fn song_ids(&self) -> Result<Vec<String>> {
        let summaries = songmark_db::get_fingerprint_summaries(&self.pool).await?;
        Ok(summaries.into_iter().map(|s| s.song_id).collect())
    }

    async fn records_for_song(&self, song_id: &str) -> Result<Vec<FingerprintRecord>> {
        songmark_db::get_fingerprints_by_song(&self.pool, song_id)
            .await?
            .into_iter()
            .map(to_record)
            .collect()
    }

    async fn record_count(&self) -> Result<usize> {
        Ok(songmark_db::count_fingerprints(&self.pool).await? as usize)
    }
}

#[async_trait]
impl SongStore for PostgresqlBackend {
    async fn put_song(&self, metadata: &SongMetadata) -> Result<()> {
        let song = NewSong {
            song_id: metadata.song_id.clone(),
            title: metadata.title.clone(),
            artist: metadata.artist.clone(),
            album_name: metadata.album_name.clone(),
            album_url: metadata.album_url.clone(),
            catalog_url: metadata.catalog_url.clone(),
            cover_art: metadata.cover_art.clone(),
        };
        songmark_db::upsert_song(&self.pool, &song).await?;
        Ok(())
    }

    async fn get_song(&self, song_id: &str) -> Result<Option<SongMetadata>> {
        let song = songmark_db::get_song(&self.pool, song_id).await?;
        Ok(song.map(|s| SongMetadata {
            song_id: s.song_id,
            title: s.title,
            artist: s.artist,
            album_name: s.album_name,
            album_url: s.album_url,
            catalog_url: s.catalog_url,
            cover_art: s.cover_art,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_conversion() {
        let fp = songmark_db::Fingerprint {
            id: 7,
            hash: "100_205_4".to_string(),
            song_id: "abc".to_string(),
            t_anchor: 12.5,
        };
        assert_eq!(
            to_record(fp).unwrap(),
            FingerprintRecord::new(HashKey::new(100, 205, 4), "abc", 12.5)
        );

        let bad = songmark_db::Fingerprint {
            id: 8,
            hash: "not-a-hash".to_string(),
            song_id: "abc".to_string(),
            t_anchor: 0.0,
        };
        assert!(matches!(to_record(bad), Err(Error::InvalidHashKey(_))));
    }

    // Requires a running PostgreSQL instance:
    // cargo test --package songmark-core -- --ignored
    #[tokio::test]
    #[ignore]
    async fn test_postgresql_roundtrip() {
        let backend = PostgresqlBackend::new(&PostgresqlConfig::default())
            .await
            .unwrap();
        let song_id = format!("pg-test-{}", std::process::id());
        let records = vec![
            FingerprintRecord::new(HashKey::new(1, 2, 3), song_id.as_str(), 0.5),
            FingerprintRecord::new(HashKey::new(4, 5, 6), song_id.as_str(), 1.0),
        ];

        backend.write_batch(&song_id, &records).await.unwrap();
        assert!(matches!(
            backend.write_batch(&song_id, &records).await,
            Err(Error::DuplicateSong(_))
        ));
        assert_eq!(backend.lookup(&HashKey::new(1, 2, 3)).await.unwrap().len(), 1);
        assert_eq!(backend.delete_song(&song_id).await.unwrap(), 2);
    }
}
