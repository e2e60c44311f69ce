//! Songmark Core - landmark-based song recognition
//!
//! Audio is turned into a log-magnitude spectrogram, salient peaks are paired
//! into landmarks, and landmarks are quantised into hash keys. Indexing stores
//! one record per landmark; identification looks every query hash up in one
//! batch and votes on the time offset between query and stored song.

pub mod audio;
pub mod config;
pub mod error;
pub mod hashing;
pub mod landmark;
pub mod matching;
pub mod peaks;
pub mod pipeline;
pub mod spectrogram;
pub mod storage_backend;
pub mod storage_config;

pub use audio::{load_waveform, Waveform};
pub use config::{DbReference, MatchingConfig, SongmarkConfig, WindowKind};
pub use error::{Error, Result};
pub use hashing::{FingerprintRecord, HashKey, LandmarkHasher};
pub use landmark::{Landmark, LandmarkGenerator};
pub use matching::{MatchResult, MatchStatus, Matcher, QueryHashMap, RejectReason, VoteTable};
pub use peaks::{Peak, PeakPicker};
pub use pipeline::{AudioSource, Fingerprinter, Recognizer};
pub use spectrogram::{Spectrogram, SpectrogramBuilder};
pub use storage_backend::{
    open_backend, FilesystemBackend, FingerprintIndex, MemoryBackend, PostgresqlBackend,
    SongMetadata, SongStore, StorageBackend,
};
pub use storage_config::SongmarkSettings;

/// Generate landmarks from a WAV file
pub fn generate_landmarks(
    audio_path: &std::path::Path,
    config: &SongmarkConfig,
) -> Result<Vec<Landmark>> {
    Fingerprinter::new(config)?.landmarks(AudioSource::Path(audio_path))
}
