//! Audio input
//!
//! The pipeline consumes mono PCM at a known sample rate. Transcoding other
//! containers into WAV is left to the caller; this module reads WAV files,
//! downmixes them and brings them to the analysis sample rate.

mod decoder;
mod resample;

pub use decoder::{decode_wav, AudioData};
pub use resample::resample_to_target;

use crate::error::{Error, Result};
use std::path::Path;

/// Mono samples at a known sample rate
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn duration_ms(&self) -> u32 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.samples.len() as f64 / self.sample_rate as f64 * 1000.0) as u32
    }

    /// Resample to `target_rate` if needed
    pub fn into_rate(self, target_rate: u32) -> Result<Self> {
        if self.sample_rate == 0 || target_rate == 0 {
            return Err(Error::InvalidSampleRate(self.sample_rate.min(target_rate)));
        }
        if self.sample_rate == target_rate {
            return Ok(self);
        }
        let samples = resample_to_target(&self.samples, self.sample_rate, target_rate)?;
        Ok(Self::new(samples, target_rate))
    }
}

/// Decode a WAV file into a mono waveform at `target_sample_rate`
pub fn load_waveform(path: &Path, target_sample_rate: u32) -> Result<Waveform> {
    let audio_data = decode_wav(path)?;

    log::debug!(
        "Decoded {}: {:.1}s, {} channel(s) @ {}Hz",
        path.display(),
        audio_data.duration_ms as f64 / 1000.0,
        audio_data.channels,
        audio_data.sample_rate
    );

    Waveform::new(audio_data.to_mono(), audio_data.sample_rate).into_rate(target_sample_rate)
}
