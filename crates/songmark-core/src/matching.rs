//! Offset voting and match decision
//!
//! Every query landmark whose hash is stored for a song votes for the time
//! offset between the query and the song. A true match piles its votes onto
//! a single offset; unrelated songs spread theirs thinly.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::config::MatchingConfig;
use crate::error::Result;
use crate::hashing::{FingerprintRecord, HashKey, LandmarkHasher};
use crate::landmark::Landmark;
use crate::storage_backend::FingerprintIndex;

#[cfg(test)]
mod tests;

/// Outcome of a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    Matched,
    NotInDb,
    LowConfidence,
}

/// Why a query was not matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// No stored record shares a hash with the query
    NoCandidates,
    /// The runner-up song scored too close to the best one
    Ambiguous,
    /// The best song did not reach the vote floor
    BelowVoteFloor,
}

/// Query result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Matched song, set only when `status` is `Matched`
    pub song_id: Option<String>,
    /// Votes at the best song's dominant offset
    pub votes: u32,
    pub status: MatchStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectReason>,
    /// Dominant `query time - stored anchor time` of the best song, in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset_seconds: Option<f64>,
    /// Best score among all other songs
    pub runner_up_votes: u32,
    /// Number of songs that received any vote
    pub candidates: usize,
}

impl MatchResult {
    pub fn is_match(&self) -> bool {
        self.status == MatchStatus::Matched
    }

    fn no_candidates() -> Self {
        Self {
            song_id: None,
            votes: 0,
            status: MatchStatus::NotInDb,
            reason: Some(RejectReason::NoCandidates),
            offset_seconds: None,
            runner_up_votes: 0,
            candidates: 0,
        }
    }
}

/// Query hashes with the set of (rounded) query times each occurs at
///
/// Times are held as integer ticks of `10^-precision` seconds.
#[derive(Debug, Clone, Default)]
pub struct QueryHashMap {
    times: HashMap<HashKey, BTreeSet<i64>>,
}

impl QueryHashMap {
    pub fn build(hasher: &LandmarkHasher, landmarks: &[Landmark], precision: u32) -> Self {
        let mut times: HashMap<HashKey, BTreeSet<i64>> = HashMap::new();
        for landmark in landmarks {
            times
                .entry(hasher.hash(landmark))
                .or_default()
                .insert(to_ticks(landmark.t_anchor, precision));
        }
        Self { times }
    }

    /// Distinct query hashes
    pub fn keys(&self) -> HashSet<HashKey> {
        self.times.keys().copied().collect()
    }

    pub fn times(&self, key: &HashKey) -> Option<&BTreeSet<i64>> {
        self.times.get(key)
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

/// Best offset of one song
#[derive(Debug, Clone, PartialEq)]
pub struct SongScore {
    pub song_id: String,
    pub votes: u32,
    pub offset_ticks: i64,
}

/// Votes per song per offset tick
#[derive(Debug, Clone, Default)]
pub struct VoteTable {
    votes: HashMap<String, HashMap<i64, u32>>,
}

impl VoteTable {
    pub fn add(&mut self, song_id: &str, offset_ticks: i64) {
        if let Some(offsets) = self.votes.get_mut(song_id) {
            *offsets.entry(offset_ticks).or_insert(0) += 1;
        } else {
            self.votes
                .insert(song_id.to_string(), HashMap::from([(offset_ticks, 1)]));
        }
    }

    pub fn get(&self, song_id: &str, offset_ticks: i64) -> u32 {
        self.votes
            .get(song_id)
            .and_then(|offsets| offsets.get(&offset_ticks))
            .copied()
            .unwrap_or(0)
    }

    /// Number of songs with at least one vote
    pub fn num_songs(&self) -> usize {
        self.votes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }

    /// Each song's largest single-offset count, best first
    ///
    /// Offset ties within a song go to the smallest offset; score ties
    /// between songs are ordered by song id.
    pub fn scores(&self) -> Vec<SongScore> {
        let mut scores: Vec<SongScore> = self
            .votes
            .iter()
            .filter_map(|(song_id, offsets)| {
                offsets
                    .iter()
                    .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
                    .map(|(&offset_ticks, &votes)| SongScore {
                        song_id: song_id.clone(),
                        votes,
                        offset_ticks,
                    })
            })
            .collect();
        scores.sort_by(|a, b| b.votes.cmp(&a.votes).then_with(|| a.song_id.cmp(&b.song_id)));
        scores
    }
}

/// Song identification against a fingerprint index
#[derive(Debug, Clone)]
pub struct Matcher {
    config: MatchingConfig,
    hasher: LandmarkHasher,
}

impl Matcher {
    pub fn new(config: MatchingConfig, hasher: LandmarkHasher) -> Self {
        Self { config, hasher }
    }

    pub fn config(&self) -> &MatchingConfig {
        &self.config
    }

    /// Identify the song the query landmarks came from
    ///
    /// The index is consulted once, with every distinct query hash.
    pub async fn query<I>(&self, index: &I, landmarks: &[Landmark]) -> Result<MatchResult>
    where
        I: FingerprintIndex + ?Sized,
    {
        let query_map = QueryHashMap::build(&self.hasher, landmarks, self.config.offset_precision);
        if query_map.is_empty() {
            log::debug!("Query produced no landmarks");
            return Ok(MatchResult::no_candidates());
        }

        let records = index.lookup_many(&query_map.keys()).await?;
        log::debug!(
            "{} landmarks, {} distinct hashes, {} stored records hit",
            landmarks.len(),
            query_map.len(),
            records.len()
        );

        let votes = self.tally(&query_map, &records);
        Ok(self.decide(&votes))
    }

    /// Accumulate offset votes for every (record, query time) pair
    pub fn tally(&self, query_map: &QueryHashMap, records: &[FingerprintRecord]) -> VoteTable {
        let precision = self.config.offset_precision;
        let scale = tick_scale(precision);
        let mut votes = VoteTable::default();

        for record in records {
            let Some(query_times) = query_map.times(&record.hash) else {
                continue;
            };
            for &query_ticks in query_times {
                let t_query = query_ticks as f64 / scale;
                votes.add(&record.song_id, to_ticks(t_query - record.t_anchor, precision));
            }
        }

        votes
    }

    /// Apply the ratio test, then the vote floor
    pub fn decide(&self, votes: &VoteTable) -> MatchResult {
        let scores = votes.scores();
        let Some(best) = scores.first() else {
            log::debug!("No candidate songs");
            return MatchResult::no_candidates();
        };
        let runner_up_votes = scores.get(1).map_or(0, |s| s.votes);

        let mut result = MatchResult {
            song_id: None,
            votes: best.votes,
            status: MatchStatus::NotInDb,
            reason: None,
            offset_seconds: Some(
                best.offset_ticks as f64 / tick_scale(self.config.offset_precision),
            ),
            runner_up_votes,
            candidates: scores.len(),
        };

        log::trace!(
            "Best {} with {} votes at offset {} ticks, runner-up {} votes",
            best.song_id,
            best.votes,
            best.offset_ticks,
            runner_up_votes
        );

        if runner_up_votes > 0
            && (best.votes as f64 / runner_up_votes as f64) < self.config.ratio_threshold
        {
            log::info!(
                "Ambiguous match: {} has {} votes, runner-up {} has {}",
                best.song_id,
                best.votes,
                scores[1].song_id,
                runner_up_votes
            );
            result.reason = Some(RejectReason::Ambiguous);
            return result;
        }

        if best.votes < self.config.min_vote_threshold {
            log::debug!(
                "Best song {} has {} votes, below floor {}",
                best.song_id,
                best.votes,
                self.config.min_vote_threshold
            );
            result.status = MatchStatus::LowConfidence;
            result.reason = Some(RejectReason::BelowVoteFloor);
            return result;
        }

        result.status = MatchStatus::Matched;
        result.song_id = Some(best.song_id.clone());
        result
    }
}

fn tick_scale(precision: u32) -> f64 {
    10f64.powi(precision as i32)
}

/// Round seconds to `precision` decimals, as integer ticks
fn to_ticks(seconds: f64, precision: u32) -> i64 {
    (seconds * tick_scale(precision)).round() as i64
}
