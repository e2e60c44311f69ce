use serde::{Deserialize, Serialize};

/// A fingerprint row as stored in the `fingerprints` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fingerprint {
    pub id: i64,
    pub hash: String,
    pub song_id: String,
    pub t_anchor: f64,
}

/// Input structure for creating new fingerprints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewFingerprint {
    pub hash: String,
    pub song_id: String,
    pub t_anchor: f64,
}

/// Song metadata stored alongside the fingerprints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Song {
    pub song_id: String,
    pub title: String,
    pub artist: Option<String>,
    pub album_name: Option<String>,
    pub album_url: Option<String>,
    pub catalog_url: Option<String>,
    pub cover_art: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Input structure for creating or replacing song metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSong {
    pub song_id: String,
    pub title: String,
    pub artist: Option<String>,
    pub album_name: Option<String>,
    pub album_url: Option<String>,
    pub catalog_url: Option<String>,
    pub cover_art: Option<String>,
}

/// Per-song fingerprint totals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FingerprintSummary {
    pub song_id: String,
    pub num_records: i32,
    pub indexed_at: chrono::DateTime<chrono::Utc>,
}
