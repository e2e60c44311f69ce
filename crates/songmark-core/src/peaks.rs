//! Peak picking using 2D max filtering
//!
//! A cell is a peak when it equals the maximum of its `size x size`
//! neighbourhood and is louder than the threshold. Ties count as peaks.

use crate::config::SongmarkConfig;
use crate::spectrogram::Spectrogram;
use serde::{Deserialize, Serialize};

/// A salient spectrogram point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Peak {
    /// Frame start time in seconds
    pub time: f64,
    /// Bin frequency in Hz
    pub freq: f64,
}

impl Peak {
    pub fn new(time: f64, freq: f64) -> Self {
        Self { time, freq }
    }
}

/// Peak picker
#[derive(Debug, Clone)]
pub struct PeakPicker {
    neighborhood_size: usize,
    threshold_db: f64,
}

impl PeakPicker {
    pub fn new(neighborhood_size: usize, threshold_db: f64) -> Self {
        Self {
            neighborhood_size: neighborhood_size.max(1),
            threshold_db,
        }
    }

    pub fn from_config(config: &SongmarkConfig) -> Self {
        Self::new(config.neighborhood_size, config.threshold_db)
    }

    /// Extract peaks in frame-major, then bin, order
    pub fn pick(&self, spectrogram: &Spectrogram) -> Vec<Peak> {
        let num_frames = spectrogram.num_frames();
        let num_bins = spectrogram.num_bins();
        if num_frames == 0 || num_bins == 0 {
            return Vec::new();
        }

        let max_filtered = self.apply_2d_max_filter(spectrogram);

        let mut peaks = Vec::new();
        for t in 0..num_frames {
            for f in 0..num_bins {
                let value = spectrogram.get(f, t);
                if value >= max_filtered[t * num_bins + f] && value > self.threshold_db {
                    peaks.push(Peak::new(
                        spectrogram.frame_to_time(t),
                        spectrogram.bin_to_freq(f),
                    ));
                }
            }
        }

        log::trace!(
            "Picked {} peaks from {} x {} spectrogram",
            peaks.len(),
            num_frames,
            num_bins
        );

        peaks
    }

    /// Inclusive neighbourhood `[i - size/2, i + (size-1)/2]` clipped to `0..len`
    fn window(&self, i: usize, len: usize) -> std::ops::Range<usize> {
        let start = i.saturating_sub(self.neighborhood_size / 2);
        let end = (i + (self.neighborhood_size - 1) / 2 + 1).min(len);
        start..end
    }

    /// Separable max filter (frequency then time), frame-major output
    fn apply_2d_max_filter(&self, spectrogram: &Spectrogram) -> Vec<f64> {
        let num_frames = spectrogram.num_frames();
        let num_bins = spectrogram.num_bins();

        let mut freq_filtered = vec![f64::NEG_INFINITY; num_frames * num_bins];
        for t in 0..num_frames {
            let frame = spectrogram.frame(t);
            for f in 0..num_bins {
                freq_filtered[t * num_bins + f] = frame[self.window(f, num_bins)]
                    .iter()
                    .copied()
                    .fold(f64::NEG_INFINITY, f64::max);
            }
        }

        let mut time_filtered = vec![f64::NEG_INFINITY; num_frames * num_bins];
        for t in 0..num_frames {
            let frames = self.window(t, num_frames);
            for f in 0..num_bins {
                time_filtered[t * num_bins + f] = frames
                    .clone()
                    .map(|ti| freq_filtered[ti * num_bins + f])
                    .fold(f64::NEG_INFINITY, f64::max);
            }
        }

        time_filtered
    }
}

impl Default for PeakPicker {
    fn default() -> Self {
        Self::from_config(&SongmarkConfig::default())
    }
}
