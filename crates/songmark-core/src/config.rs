//! Configuration parameters for fingerprinting and matching

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Vote floor used by the lenient end-to-end deployment
pub const LENIENT_MIN_VOTES: u32 = 10;

/// Analysis window applied to each frame before the FFT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowKind {
    #[default]
    Rectangular,
    Hann,
}

/// Reference level for the dB conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbReference {
    /// `20 * log10(magnitude + 1e-10)`
    #[default]
    Absolute,
    /// Same, shifted so the loudest cell sits at 0 dB
    Peak,
}

/// Fingerprinting parameters
///
/// Indexing and querying must use the same values, otherwise hashes and
/// anchor times do not line up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SongmarkConfig {
    // Audio processing
    pub sample_rate: u32,

    // Spectrogram
    pub frame_size: usize,
    pub hop_size: usize,
    pub window: WindowKind,
    pub reference: DbReference,
    pub parallel_frames: bool,

    // Peak picking
    pub neighborhood_size: usize,
    pub threshold_db: f64,

    // Landmark generation
    pub fanout: usize,
    pub max_dt: f64,

    // Hashing
    pub freq_bin: f64,
    pub time_bin: f64,
}

impl Default for SongmarkConfig {
    fn default() -> Self {
        Self {
            sample_rate: 22050,

            frame_size: 2048,
            hop_size: 512,
            window: WindowKind::Rectangular,
            reference: DbReference::Absolute,
            parallel_frames: true,

            neighborhood_size: 15,
            threshold_db: -40.0,

            fanout: 5,
            max_dt: 2.0,

            freq_bin: 10.0,
            time_bin: 0.1,
        }
    }
}

impl SongmarkConfig {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(invalid("sample_rate must be > 0"));
        }
        if self.frame_size < 2 {
            return Err(invalid("frame_size must be >= 2"));
        }
        if self.hop_size == 0 {
            return Err(invalid("hop_size must be > 0"));
        }
        if self.neighborhood_size == 0 {
            return Err(invalid("neighborhood_size must be > 0"));
        }
        if !self.threshold_db.is_finite() {
            return Err(invalid("threshold_db must be finite"));
        }
        if self.fanout == 0 {
            return Err(invalid("fanout must be > 0"));
        }
        if !(self.max_dt > 0.0) {
            return Err(invalid("max_dt must be > 0"));
        }
        if !(self.freq_bin > 0.0) || !(self.time_bin > 0.0) {
            return Err(invalid("freq_bin and time_bin must be > 0"));
        }
        Ok(())
    }
}

/// Decision thresholds for the matcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Minimum single-offset votes for a match
    pub min_vote_threshold: u32,
    /// Required ratio between the best and the runner-up song
    pub ratio_threshold: f64,
    /// Decimal places used when rounding anchor times and offsets
    pub offset_precision: u32,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            min_vote_threshold: 100,
            ratio_threshold: 2.5,
            offset_precision: 2,
        }
    }
}

impl MatchingConfig {
    /// Defaults with the lower vote floor of the end-to-end deployment
    pub fn lenient() -> Self {
        Self {
            min_vote_threshold: LENIENT_MIN_VOTES,
            ..Self::default()
        }
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if !(self.ratio_threshold > 0.0) || !self.ratio_threshold.is_finite() {
            return Err(invalid("ratio_threshold must be a positive number"));
        }
        if self.offset_precision > 6 {
            return Err(invalid("offset_precision must be <= 6"));
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> Error {
    Error::InvalidConfig(msg.to_string())
}
