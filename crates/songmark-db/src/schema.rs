//! Table definitions
//!
//! `fingerprinted_songs` holds one row per indexed song and is written in the
//! same transaction as that song's fingerprints. Its primary key is what makes
//! indexing a song twice fail instead of doubling its votes.

use anyhow::{Context, Result};
use deadpool_postgres::Pool;

pub const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS songs (
    song_id     TEXT PRIMARY KEY,
    title       TEXT NOT NULL,
    artist      TEXT,
    album_name  TEXT,
    album_url   TEXT,
    catalog_url TEXT,
    cover_art   TEXT,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS fingerprinted_songs (
    song_id     TEXT PRIMARY KEY,
    num_records INTEGER NOT NULL,
    indexed_at  TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS fingerprints (
    id       BIGSERIAL PRIMARY KEY,
    hash     TEXT NOT NULL,
    song_id  TEXT NOT NULL REFERENCES fingerprinted_songs (song_id) ON DELETE CASCADE,
    t_anchor DOUBLE PRECISION NOT NULL
);

CREATE INDEX IF NOT EXISTS fingerprints_hash_idx ON fingerprints (hash);
CREATE INDEX IF NOT EXISTS fingerprints_song_idx ON fingerprints (song_id);
";

/// Create tables and indexes if they do not exist yet
pub async fn apply_schema(pool: &Pool) -> Result<()> {
    let client = pool.get().await?;
    client
        .batch_execute(SCHEMA_SQL)
        .await
        .context("Failed to apply database schema")?;
    log::debug!("Database schema is up to date");
    Ok(())
}
