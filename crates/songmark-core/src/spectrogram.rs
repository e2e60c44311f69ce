//! Short-time Fourier transform into a log-magnitude spectrogram
//!
//! Frames of `frame_size` samples advance by `hop_size`. Only full frames are
//! analysed, so a waveform of `len >= frame_size` samples yields
//! `1 + (len - frame_size) / hop_size` frames of `frame_size / 2 + 1` bins.

use crate::config::{DbReference, SongmarkConfig, WindowKind};
use crate::error::{Error, Result};
use rayon::prelude::*;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::f64::consts::PI;
use std::sync::Arc;

/// Added to magnitudes before the log so silence stays finite (-200 dB)
const MAGNITUDE_FLOOR: f64 = 1e-10;

/// Log-magnitude spectrogram, stored frame-major
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrogram {
    data: Vec<f64>,
    num_bins: usize,
    num_frames: usize,
    sample_rate: u32,
    frame_size: usize,
    hop_size: usize,
}

impl Spectrogram {
    /// Value in dB at (`bin`, `frame`)
    #[inline]
    pub fn get(&self, bin: usize, frame: usize) -> f64 {
        self.data[frame * self.num_bins + bin]
    }

    /// All bins of one frame
    pub fn frame(&self, frame: usize) -> &[f64] {
        let start = frame * self.num_bins;
        &self.data[start..start + self.num_bins]
    }

    pub fn num_bins(&self) -> usize {
        self.num_bins
    }

    pub fn num_frames(&self) -> usize {
        self.num_frames
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn hop_size(&self) -> usize {
        self.hop_size
    }

    /// Centre frequency of a bin in Hz
    pub fn bin_to_freq(&self, bin: usize) -> f64 {
        bin as f64 * self.sample_rate as f64 / self.frame_size as f64
    }

    /// Start time of a frame in seconds
    pub fn frame_to_time(&self, frame: usize) -> f64 {
        (frame * self.hop_size) as f64 / self.sample_rate as f64
    }

    /// Largest value in the matrix
    pub fn max_value(&self) -> f64 {
        self.data.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    /// Build directly from per-frame columns
    pub(crate) fn from_frames(
        frames: Vec<Vec<f64>>,
        sample_rate: u32,
        frame_size: usize,
        hop_size: usize,
    ) -> Self {
        let num_frames = frames.len();
        let num_bins = frames.first().map_or(0, Vec::len);
        let data = frames.into_iter().flatten().collect();
        Self {
            data,
            num_bins,
            num_frames,
            sample_rate,
            frame_size,
            hop_size,
        }
    }
}

/// Computes spectrograms with fixed framing parameters
#[derive(Debug, Clone)]
pub struct SpectrogramBuilder {
    frame_size: usize,
    hop_size: usize,
    window: WindowKind,
    reference: DbReference,
    parallel: bool,
}

impl SpectrogramBuilder {
    pub fn new(frame_size: usize, hop_size: usize) -> Self {
        Self {
            frame_size,
            hop_size,
            window: WindowKind::Rectangular,
            reference: DbReference::Absolute,
            parallel: true,
        }
    }

    pub fn from_config(config: &SongmarkConfig) -> Self {
        Self::new(config.frame_size, config.hop_size)
            .with_window(config.window)
            .with_reference(config.reference)
            .with_parallel(config.parallel_frames)
    }

    pub fn with_window(mut self, window: WindowKind) -> Self {
        self.window = window;
        self
    }

    pub fn with_reference(mut self, reference: DbReference) -> Self {
        self.reference = reference;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn hop_size(&self) -> usize {
        self.hop_size
    }

    /// Number of full frames in `len` samples
    pub fn frame_count(&self, len: usize) -> usize {
        if len < self.frame_size || self.hop_size == 0 {
            0
        } else {
            1 + (len - self.frame_size) / self.hop_size
        }
    }

    /// Compute the spectrogram of mono `samples`
    pub fn build(&self, samples: &[f32], sample_rate: u32) -> Result<Spectrogram> {
        if samples.is_empty() {
            return Err(Error::EmptyWaveform);
        }
        if sample_rate == 0 {
            return Err(Error::InvalidSampleRate(sample_rate));
        }
        if self.frame_size < 2 || self.hop_size == 0 {
            return Err(Error::InvalidConfig(format!(
                "frame_size {} / hop_size {} cannot frame a signal",
                self.frame_size, self.hop_size
            )));
        }
        if samples.len() < self.frame_size {
            return Err(Error::WaveformTooShort {
                samples: samples.len(),
                frame_size: self.frame_size,
            });
        }

        let num_frames = self.frame_count(samples.len());
        let num_bins = self.frame_size / 2 + 1;

        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(self.frame_size);
        let window = match self.window {
            WindowKind::Rectangular => None,
            WindowKind::Hann => Some(hann_window(self.frame_size)),
        };

        let column = |frame_idx: usize| {
            let start = frame_idx * self.hop_size;
            self.frame_magnitudes(
                &samples[start..start + self.frame_size],
                window.as_deref(),
                &fft,
                num_bins,
            )
        };

        let frames: Vec<Vec<f64>> = if self.parallel {
            (0..num_frames).into_par_iter().map(column).collect()
        } else {
            (0..num_frames).map(column).collect()
        };

        let mut spectrogram =
            Spectrogram::from_frames(frames, sample_rate, self.frame_size, self.hop_size);

        if self.reference == DbReference::Peak {
            let max = spectrogram.max_value();
            spectrogram.data.iter_mut().for_each(|v| *v -= max);
        }

        log::trace!(
            "Spectrogram: {} frames x {} bins from {} samples",
            num_frames,
            num_bins,
            samples.len()
        );

        Ok(spectrogram)
    }

    fn frame_magnitudes(
        &self,
        frame: &[f32],
        window: Option<&[f64]>,
        fft: &Arc<dyn Fft<f64>>,
        num_bins: usize,
    ) -> Vec<f64> {
        let mut buffer: Vec<Complex<f64>> = match window {
            Some(w) => frame
                .iter()
                .zip(w)
                .map(|(&s, &w)| Complex::new(s as f64 * w, 0.0))
                .collect(),
            None => frame.iter().map(|&s| Complex::new(s as f64, 0.0)).collect(),
        };

        fft.process(&mut buffer);

        buffer[..num_bins]
            .iter()
            .map(|c| 20.0 * (c.norm() + MAGNITUDE_FLOOR).log10())
            .collect()
    }
}

impl Default for SpectrogramBuilder {
    fn default() -> Self {
        Self::from_config(&SongmarkConfig::default())
    }
}

/// Create Hann window
pub fn hann_window(size: usize) -> Vec<f64> {
    if size < 2 {
        return vec![1.0; size];
    }
    (0..size)
        .map(|i| {
            let x = i as f64 / (size - 1) as f64;
            0.5 * (1.0 - (2.0 * PI * x).cos())
        })
        .collect()
}
