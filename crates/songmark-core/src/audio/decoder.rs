//! WAV decoding

use crate::error::{Error, Result};
use std::path::Path;

/// Decoded audio data, interleaved when `channels > 1`
#[derive(Debug, Clone)]
pub struct AudioData {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
    pub duration_ms: u32,
}

impl AudioData {
    /// Convert to mono by averaging channels
    pub fn to_mono(&self) -> Vec<f32> {
        if self.channels <= 1 {
            return self.samples.clone();
        }

        let mut mono = Vec::with_capacity(self.samples.len() / self.channels as usize);
        for chunk in self.samples.chunks(self.channels as usize) {
            let avg: f32 = chunk.iter().sum::<f32>() / chunk.len() as f32;
            mono.push(avg);
        }
        mono
    }
}

/// Decode a WAV file, integer samples scaled into [-1, 1)
pub fn decode_wav(path: &Path) -> Result<AudioData> {
    if !path.exists() {
        return Err(Error::AudioNotFound(path.to_path_buf()));
    }

    let decode_err = |source| Error::Decode {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = hound::WavReader::open(path).map_err(decode_err)?;

    let spec = reader.spec();
    let sample_rate = spec.sample_rate;
    let channels = spec.channels;
    if sample_rate == 0 {
        return Err(Error::InvalidSampleRate(0));
    }

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(decode_err)?,
        hound::SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(decode_err)?
        }
    };

    let duration_ms =
        (samples.len() as f64 / (sample_rate * channels.max(1) as u32) as f64 * 1000.0) as u32;

    Ok(AudioData {
        samples,
        sample_rate,
        channels,
        duration_ms,
    })
}
