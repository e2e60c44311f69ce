//! Songmark Database Layer
//!
//! PostgreSQL storage for fingerprint records and song metadata

pub mod connection;
pub mod models;
pub mod operations;
pub mod schema;

// Re-export commonly used types
pub use connection::{create_pool, test_connection, DbPool};
pub use models::{Fingerprint, FingerprintSummary, NewFingerprint, NewSong, Song};
pub use operations::{
    count_fingerprints, delete_song_fingerprints, get_fingerprint_summaries,
    get_fingerprints_by_hashes, get_fingerprints_by_song, get_song, insert_fingerprints_batch,
    song_is_fingerprinted, upsert_song, DbError,
};
pub use schema::{apply_schema, SCHEMA_SQL};
