//! Anchor/target peak pairing

use crate::config::SongmarkConfig;
use crate::peaks::Peak;
use serde::{Deserialize, Serialize};

/// A pair of peaks: anchor frequency, target frequency, time gap, anchor time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub f1: f64,
    pub f2: f64,
    pub dt: f64,
    pub t_anchor: f64,
}

/// Pairs every peak with up to `fanout` later peaks within `max_dt` seconds
#[derive(Debug, Clone)]
pub struct LandmarkGenerator {
    fanout: usize,
    max_dt: f64,
}

impl LandmarkGenerator {
    pub fn new(fanout: usize, max_dt: f64) -> Self {
        Self { fanout, max_dt }
    }

    pub fn from_config(config: &SongmarkConfig) -> Self {
        Self::new(config.fanout, config.max_dt)
    }

    pub fn generate(&self, peaks: &[Peak]) -> Vec<Landmark> {
        let mut sorted = peaks.to_vec();
        sorted.sort_by(|a, b| a.time.total_cmp(&b.time));

        let mut landmarks = Vec::with_capacity(sorted.len() * self.fanout);

        for (i, anchor) in sorted.iter().enumerate() {
            let mut emitted = 0;
            for target in &sorted[i + 1..] {
                if emitted >= self.fanout {
                    break;
                }
                let dt = target.time - anchor.time;
                if dt <= 0.0 {
                    continue;
                }
                if dt > self.max_dt {
                    break;
                }
                landmarks.push(Landmark {
                    f1: anchor.freq,
                    f2: target.freq,
                    dt,
                    t_anchor: anchor.time,
                });
                emitted += 1;
            }
        }

        log::trace!(
            "Generated {} landmarks from {} peaks",
            landmarks.len(),
            sorted.len()
        );

        landmarks
    }
}

impl Default for LandmarkGenerator {
    fn default() -> Self {
        Self::from_config(&SongmarkConfig::default())
    }
}
