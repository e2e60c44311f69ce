use anyhow::{Context, Result};
use deadpool_postgres::Pool;
use tokio_postgres::error::SqlState;
use tokio_postgres::Row;

use crate::models::*;

/// Errors callers need to tell apart from generic database failures
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("song {0} already has fingerprints")]
    DuplicateSong(String),
}

/// Insert all fingerprints of one song in a single transaction.
///
/// A marker row in `fingerprinted_songs` is written first; if the song was
/// already indexed the primary key rejects it and nothing is inserted.
pub async fn insert_fingerprints_batch(
    pool: &Pool,
    song_id: &str,
    fingerprints: &[NewFingerprint],
) -> Result<u64> {
    let mut client = pool.get().await?;
    let tx = client
        .transaction()
        .await
        .context("Failed to start transaction")?;

    let num_records = fingerprints.len() as i32;
    if let Err(e) = tx
        .execute(
            "INSERT INTO fingerprinted_songs (song_id, num_records) VALUES ($1, $2)",
            &[&song_id, &num_records],
        )
        .await
    {
        if e.code() == Some(&SqlState::UNIQUE_VIOLATION) {
            return Err(DbError::DuplicateSong(song_id.to_string()).into());
        }
        return Err(e).context("Failed to insert song marker");
    }

    let inserted = if fingerprints.is_empty() {
        0
    } else {
        // Build the JSONB array
        let json_array =
            serde_json::to_value(fingerprints).context("Failed to serialize fingerprints")?;

        tx.execute(
            "INSERT INTO fingerprints (hash, song_id, t_anchor)
             SELECT
                 fp->>'hash',
                 fp->>'song_id',
                 (fp->>'t_anchor')::DOUBLE PRECISION
             FROM jsonb_array_elements($1::jsonb) AS fp",
            &[&json_array],
        )
        .await
        .context("Failed to batch insert fingerprints")?
    };

    tx.commit().await.context("Failed to commit fingerprints")?;

    log::debug!("Inserted {} fingerprints for {}", inserted, song_id);

    Ok(inserted)
}

/// Fetch every fingerprint whose hash is in `hashes`, in one round trip
pub async fn get_fingerprints_by_hashes(
    pool: &Pool,
    hashes: &[String],
) -> Result<Vec<Fingerprint>> {
    if hashes.is_empty() {
        return Ok(Vec::new());
    }

    let client = pool.get().await?;

    let rows = client
        .query(
            "SELECT id, hash, song_id, t_anchor
             FROM fingerprints
             WHERE hash = ANY($1)",
            &[&hashes],
        )
        .await
        .context("Failed to get fingerprints by hash")?;

    Ok(rows.iter().map(fingerprint_from_row).collect())
}

/// Get all fingerprints of one song
pub async fn get_fingerprints_by_song(pool: &Pool, song_id: &str) -> Result<Vec<Fingerprint>> {
    let client = pool.get().await?;

    let rows = client
        .query(
            "SELECT id, hash, song_id, t_anchor
             FROM fingerprints
             WHERE song_id = $1
             ORDER BY id",
            &[&song_id],
        )
        .await
        .context("Failed to get fingerprints by song")?;

    Ok(rows.iter().map(fingerprint_from_row).collect())
}

/// Whether a song already has a committed fingerprint batch
pub async fn song_is_fingerprinted(pool: &Pool, song_id: &str) -> Result<bool> {
    let client = pool.get().await?;

    let row = client
        .query_one(
            "SELECT EXISTS (SELECT 1 FROM fingerprinted_songs WHERE song_id = $1)",
            &[&song_id],
        )
        .await
        .context("Failed to check song marker")?;

    Ok(row.get(0))
}

/// Delete a song's fingerprints and its marker row in one transaction
///
/// Returns the number of fingerprint rows removed.
pub async fn delete_song_fingerprints(pool: &Pool, song_id: &str) -> Result<u64> {
    let mut client = pool.get().await?;
    let tx = client
        .transaction()
        .await
        .context("Failed to start transaction")?;

    let removed = tx
        .execute("DELETE FROM fingerprints WHERE song_id = $1", &[&song_id])
        .await
        .context("Failed to delete fingerprints")?;
    tx.execute(
        "DELETE FROM fingerprinted_songs WHERE song_id = $1",
        &[&song_id],
    )
    .await
    .context("Failed to delete song marker")?;

    tx.commit().await.context("Failed to commit delete")?;

    Ok(removed)
}

/// Total number of stored fingerprints
pub async fn count_fingerprints(pool: &Pool) -> Result<i64> {
    let client = pool.get().await?;

    let row = client
        .query_one("SELECT COUNT(*) FROM fingerprints", &[])
        .await
        .context("Failed to count fingerprints")?;

    Ok(row.get(0))
}

/// Per-song totals for every indexed song
pub async fn get_fingerprint_summaries(pool: &Pool) -> Result<Vec<FingerprintSummary>> {
    let client = pool.get().await?;

    let rows = client
        .query(
            "SELECT song_id, num_records, indexed_at
             FROM fingerprinted_songs
             ORDER BY song_id",
            &[],
        )
        .await
        .context("Failed to get fingerprint summaries")?;

    Ok(rows
        .iter()
        .map(|r| FingerprintSummary {
            song_id: r.get(0),
            num_records: r.get(1),
            indexed_at: r.get(2),
        })
        .collect())
}

/// Insert or replace song metadata
pub async fn upsert_song(pool: &Pool, song: &NewSong) -> Result<()> {
    let client = pool.get().await?;

    client
        .execute(
            "INSERT INTO songs
             (song_id, title, artist, album_name, album_url, catalog_url, cover_art)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (song_id) DO UPDATE SET
                 title = EXCLUDED.title,
                 artist = EXCLUDED.artist,
                 album_name = EXCLUDED.album_name,
                 album_url = EXCLUDED.album_url,
                 catalog_url = EXCLUDED.catalog_url,
                 cover_art = EXCLUDED.cover_art",
            &[
                &song.song_id,
                &song.title,
                &song.artist,
                &song.album_name,
                &song.album_url,
                &song.catalog_url,
                &song.cover_art,
            ],
        )
        .await
        .context("Failed to upsert song")?;

    Ok(())
}

/// Get song metadata by identifier
pub async fn get_song(pool: &Pool, song_id: &str) -> Result<Option<Song>> {
    let client = pool.get().await?;

    let row = client
        .query_opt(
            "SELECT song_id, title, artist, album_name, album_url, catalog_url, cover_art,
                    created_at
             FROM songs
             WHERE song_id = $1",
            &[&song_id],
        )
        .await
        .context("Failed to get song")?;

    Ok(row.map(|r| Song {
        song_id: r.get(0),
        title: r.get(1),
        artist: r.get(2),
        album_name: r.get(3),
        album_url: r.get(4),
        catalog_url: r.get(5),
        cover_art: r.get(6),
        created_at: r.get(7),
    }))
}

fn fingerprint_from_row(r: &Row) -> Fingerprint {
    Fingerprint {
        id: r.get(0),
        hash: r.get(1),
        song_id: r.get(2),
        t_anchor: r.get(3),
    }
}
