//! Error type shared by the fingerprinting pipeline and the storage backends

use std::path::PathBuf;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("waveform is empty")]
    EmptyWaveform,

    #[error("waveform has {samples} samples, fewer than one {frame_size}-sample frame")]
    WaveformTooShort { samples: usize, frame_size: usize },

    #[error("invalid sample rate: {0}")]
    InvalidSampleRate(u32),

    #[error("failed to decode audio {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },

    #[error("resampling failed: {0}")]
    Resample(String),

    #[error("audio file not found: {0}")]
    AudioNotFound(PathBuf),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("malformed hash key {0:?}")]
    InvalidHashKey(String),

    #[error("batch for song {expected} contains a record for {found}")]
    MismatchedRecord { expected: String, found: String },

    #[error("song {0} is already indexed")]
    DuplicateSong(String),

    #[error("storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl Error {
    /// Input errors are the caller's fault and never worth retrying
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Error::EmptyWaveform
                | Error::WaveformTooShort { .. }
                | Error::InvalidSampleRate(_)
                | Error::Decode { .. }
                | Error::AudioNotFound(_)
                | Error::MismatchedRecord { .. }
        )
    }
}
