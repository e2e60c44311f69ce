//! Landmark quantisation into hash keys
//!
//! The stored form of a key is the string `"{f1_bin}_{f2_bin}_{dt_bin}"`.
//! Bins are computed with floating-point floor division so that keys written
//! by other tools for the same landmark compare equal.

use crate::config::SongmarkConfig;
use crate::error::Error;
use crate::landmark::Landmark;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Quantised landmark
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HashKey {
    pub f1_bin: i64,
    pub f2_bin: i64,
    pub dt_bin: i64,
}

impl HashKey {
    pub fn new(f1_bin: i64, f2_bin: i64, dt_bin: i64) -> Self {
        Self {
            f1_bin,
            f2_bin,
            dt_bin,
        }
    }
}

impl fmt::Display for HashKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.f1_bin, self.f2_bin, self.dt_bin)
    }
}

impl FromStr for HashKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidHashKey(s.to_string());
        let mut parts = s.split('_');
        let mut next = || -> Result<i64, Error> {
            parts
                .next()
                .ok_or_else(invalid)?
                .parse::<i64>()
                .map_err(|_| invalid())
        };
        let key = HashKey::new(next()?, next()?, next()?);
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(key)
    }
}

impl TryFrom<String> for HashKey {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HashKey> for String {
    fn from(key: HashKey) -> Self {
        key.to_string()
    }
}

/// One stored landmark occurrence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FingerprintRecord {
    pub hash: HashKey,
    pub song_id: String,
    pub t_anchor: f64,
}

impl FingerprintRecord {
    pub fn new(hash: HashKey, song_id: impl Into<String>, t_anchor: f64) -> Self {
        Self {
            hash,
            song_id: song_id.into(),
            t_anchor,
        }
    }
}

/// Maps landmarks to hash keys
#[derive(Debug, Clone)]
pub struct LandmarkHasher {
    freq_bin: f64,
    time_bin: f64,
}

impl LandmarkHasher {
    pub fn new(freq_bin: f64, time_bin: f64) -> Self {
        Self { freq_bin, time_bin }
    }

    pub fn from_config(config: &SongmarkConfig) -> Self {
        Self::new(config.freq_bin, config.time_bin)
    }

    pub fn hash(&self, landmark: &Landmark) -> HashKey {
        HashKey::new(
            floor_div(landmark.f1, self.freq_bin) as i64,
            floor_div(landmark.f2, self.freq_bin) as i64,
            floor_div(landmark.dt, self.time_bin) as i64,
        )
    }

    /// Records for indexing a song
    pub fn records(&self, song_id: &str, landmarks: &[Landmark]) -> Vec<FingerprintRecord> {
        landmarks
            .iter()
            .map(|lm| FingerprintRecord::new(self.hash(lm), song_id, lm.t_anchor))
            .collect()
    }
}

impl Default for LandmarkHasher {
    fn default() -> Self {
        Self::from_config(&SongmarkConfig::default())
    }
}

/// Floating-point floor division: `(x - x mod b) / b`, floored, rounded up
/// when the quotient lies more than half above its floor
pub fn floor_div(x: f64, b: f64) -> f64 {
    let rem = x % b;
    let mut div = (x - rem) / b;
    if rem != 0.0 && (b < 0.0) != (rem < 0.0) {
        div -= 1.0;
    }
    if div != 0.0 {
        let mut floored = div.floor();
        if div - floored > 0.5 {
            floored += 1.0;
        }
        floored
    } else {
        0.0f64.copysign(x / b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_floor_div_matches_float_floor_division() {
        assert_eq!(floor_div(0.5, 0.1), 4.0);
        assert_eq!(floor_div(0.3, 0.1), 2.0);
        assert_eq!(floor_div(1.0, 0.1), 9.0);
        assert_eq!(floor_div(1000.0, 10.0), 100.0);
        assert_eq!(floor_div(1009.9, 10.0), 100.0);
        assert_eq!(floor_div(-5.0, 10.0), -1.0);
    }

    #[test]
    fn test_hash_key_string_form() {
        let key = HashKey::new(100, 205, 4);
        assert_eq!(key.to_string(), "100_205_4");
        assert_eq!("100_205_4".parse::<HashKey>().unwrap(), key);
        assert_eq!("-1_0_3".parse::<HashKey>().unwrap(), HashKey::new(-1, 0, 3));
    }

    #[test]
    fn test_malformed_keys_rejected() {
        for bad in ["", "1_2", "1_2_3_4", "a_b_c", "1__3"] {
            assert!(
                matches!(bad.parse::<HashKey>(), Err(Error::InvalidHashKey(_))),
                "{bad:?} should not parse"
            );
        }
    }

    #[test]
    fn test_serde_uses_string_form() {
        let record = FingerprintRecord::new(HashKey::new(1, 2, 3), "song-1", 0.5);
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"hash":"1_2_3","song_id":"song-1","t_anchor":0.5}"#);
        let back: FingerprintRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_nearby_landmarks_collapse() {
        let hasher = LandmarkHasher::new(10.0, 0.1);
        let a = Landmark {
            f1: 1001.0,
            f2: 2004.0,
            dt: 0.52,
            t_anchor: 1.0,
        };
        let b = Landmark {
            f1: 1008.0,
            f2: 2009.9,
            dt: 0.58,
            t_anchor: 7.0,
        };
        assert_eq!(hasher.hash(&a), hasher.hash(&b));
        assert_eq!(hasher.hash(&a), HashKey::new(100, 200, 5));

        // one frequency bin further moves f1 to the next bin and nothing else
        let c = Landmark { f1: 1011.0, ..a };
        let (ha, hc) = (hasher.hash(&a), hasher.hash(&c));
        assert_eq!(hc.f1_bin, ha.f1_bin + 1);
        assert_eq!(hc.f2_bin, ha.f2_bin);
        assert_eq!(hc.dt_bin, ha.dt_bin);
    }

    #[test]
    fn test_records_carry_anchor_time() {
        let hasher = LandmarkHasher::default();
        let landmarks = [Landmark {
            f1: 50.0,
            f2: 60.0,
            dt: 0.25,
            t_anchor: 3.5,
        }];
        let records = hasher.records("abc", &landmarks);
        assert_eq!(records, vec![FingerprintRecord::new(HashKey::new(5, 6, 2), "abc", 3.5)]);
    }
}
