//! Tests for offset voting and the match decision

use super::*;
use crate::landmark::LandmarkGenerator;
use crate::peaks::Peak;
use crate::storage_backend::MemoryBackend;

/// Deterministic pseudo-random peaks, ten per second
fn synthetic_peaks(seed: u64, seconds: usize) -> Vec<Peak> {
    let mut state = seed;
    let mut next = move || {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (state >> 33) as f64 / (1u64 << 31) as f64
    };
    (0..seconds * 10)
        .map(|i| {
            let time = i as f64 * 0.1 + (next() * 0.05 * 100.0).round() / 100.0;
            let freq = 100.0 + (next() * 5000.0).round();
            Peak::new(time, freq)
        })
        .collect()
}

fn landmarks(seed: u64, seconds: usize) -> Vec<Landmark> {
    LandmarkGenerator::new(5, 2.0).generate(&synthetic_peaks(seed, seconds))
}

fn matcher(min_votes: u32) -> Matcher {
    Matcher::new(
        MatchingConfig {
            min_vote_threshold: min_votes,
            ..MatchingConfig::default()
        },
        LandmarkHasher::new(10.0, 0.1),
    )
}

async fn index_with(songs: &[(&str, &[Landmark])]) -> MemoryBackend {
    let backend = MemoryBackend::new();
    let hasher = LandmarkHasher::new(10.0, 0.1);
    for (song_id, lms) in songs {
        backend
            .write_batch(song_id, &hasher.records(song_id, lms))
            .await
            .unwrap();
    }
    backend
}

fn votes_at(song_id: &str, offset_ticks: i64, count: u32) -> VoteTable {
    let mut table = VoteTable::default();
    for _ in 0..count {
        table.add(song_id, offset_ticks);
    }
    table
}

#[tokio::test]
async fn test_self_match_at_zero_offset() {
    let song = landmarks(1, 30);
    let other = landmarks(2, 30);
    let index = index_with(&[("song-a", &song), ("song-b", &other)]).await;

    let result = matcher(100).query(&index, &song).await.unwrap();

    assert_eq!(result.status, MatchStatus::Matched);
    assert_eq!(result.song_id.as_deref(), Some("song-a"));
    assert_eq!(result.offset_seconds, Some(0.0));
    assert!(result.votes as usize >= song.len());
    assert!(result.is_match());
}

#[tokio::test]
async fn test_excerpt_reports_its_offset() {
    let song = landmarks(7, 30);
    let excerpt: Vec<Landmark> = song
        .iter()
        .filter(|lm| lm.t_anchor >= 10.0 && lm.t_anchor < 20.0)
        .map(|lm| Landmark {
            t_anchor: lm.t_anchor - 10.0,
            ..*lm
        })
        .collect();
    let index = index_with(&[("song", &song)]).await;

    let result = matcher(10).query(&index, &excerpt).await.unwrap();

    assert_eq!(result.status, MatchStatus::Matched);
    assert_eq!(result.offset_seconds, Some(-10.0));
}

#[tokio::test]
async fn test_empty_index_is_not_in_db() {
    let index = MemoryBackend::new();
    let result = matcher(100).query(&index, &landmarks(3, 5)).await.unwrap();

    assert_eq!(result.status, MatchStatus::NotInDb);
    assert_eq!(result.votes, 0);
    assert_eq!(result.song_id, None);
    assert_eq!(result.reason, Some(RejectReason::NoCandidates));
    assert_eq!(result.candidates, 0);
}

#[tokio::test]
async fn test_no_landmarks_skips_lookup() {
    let index = index_with(&[("song", &landmarks(4, 5))]).await;
    let result = matcher(100).query(&index, &[]).await.unwrap();
    assert_eq!(result.reason, Some(RejectReason::NoCandidates));
}

#[test]
fn test_ratio_rejection() {
    let mut table = votes_at("a", 0, 50);
    for _ in 0..40 {
        table.add("b", 12);
    }

    let result = matcher(10).decide(&table);

    assert_eq!(result.status, MatchStatus::NotInDb);
    assert_eq!(result.reason, Some(RejectReason::Ambiguous));
    assert_eq!(result.song_id, None);
    assert_eq!(result.votes, 50);
    assert_eq!(result.runner_up_votes, 40);
    assert_eq!(result.candidates, 2);
}

#[test]
fn test_runner_up_found_regardless_of_order() {
    // 100 / 60 < 2.5 whichever song is visited first
    let mut table = votes_at("c", 3, 10);
    for _ in 0..100 {
        table.add("a", 0);
    }
    for _ in 0..60 {
        table.add("b", 0);
    }

    let result = matcher(10).decide(&table);
    assert_eq!(result.reason, Some(RejectReason::Ambiguous));
    assert_eq!(result.runner_up_votes, 60);
}

#[test]
fn test_low_confidence_floor() {
    let result = matcher(100).decide(&votes_at("a", 0, 5));

    assert_eq!(result.status, MatchStatus::LowConfidence);
    assert_eq!(result.reason, Some(RejectReason::BelowVoteFloor));
    assert_eq!(result.votes, 5);
    assert_eq!(result.song_id, None);
    assert_eq!(result.runner_up_votes, 0);
}

#[test]
fn test_clear_winner_matches() {
    let mut table = votes_at("a", -250, 120);
    for _ in 0..40 {
        table.add("b", 7);
    }

    let result = matcher(100).decide(&table);

    assert_eq!(result.status, MatchStatus::Matched);
    assert_eq!(result.song_id.as_deref(), Some("a"));
    assert_eq!(result.votes, 120);
    assert_eq!(result.offset_seconds, Some(-2.5));
    assert_eq!(result.reason, None);
}

#[test]
fn test_song_score_is_best_single_offset() {
    let mut table = VoteTable::default();
    for offset in [0, 0, 0, 5, 5, 9] {
        table.add("a", offset);
    }
    // tie between offsets 2 and -1 resolves to the smaller
    for offset in [2, 2, -1, -1] {
        table.add("b", offset);
    }

    let scores = table.scores();
    assert_eq!(
        scores,
        vec![
            SongScore {
                song_id: "a".into(),
                votes: 3,
                offset_ticks: 0,
            },
            SongScore {
                song_id: "b".into(),
                votes: 2,
                offset_ticks: -1,
            },
        ]
    );
    assert_eq!(table.get("a", 5), 2);
    assert_eq!(table.get("z", 0), 0);
}

#[test]
fn test_tally_one_vote_per_query_time() {
    let hasher = LandmarkHasher::new(10.0, 0.1);
    let lm = Landmark {
        f1: 100.0,
        f2: 200.0,
        dt: 0.5,
        t_anchor: 1.0,
    };
    let query = [
        lm,
        Landmark {
            t_anchor: 3.0,
            ..lm
        },
        Landmark {
            t_anchor: 1.001,
            ..lm
        },
    ];
    let query_map = QueryHashMap::build(&hasher, &query, 2);

    // 1.0 and 1.001 round to the same time
    assert_eq!(query_map.len(), 1);
    assert_eq!(query_map.times(&hasher.hash(&lm)).map(|t| t.len()), Some(2));

    let records = vec![FingerprintRecord::new(hasher.hash(&lm), "s", 0.5)];
    let votes = matcher(1).tally(&query_map, &records);
    assert_eq!(votes.get("s", 50), 1);
    assert_eq!(votes.get("s", 250), 1);
    assert_eq!(votes.num_songs(), 1);
}

#[test]
fn test_records_for_unknown_hash_ignored() {
    let hasher = LandmarkHasher::new(10.0, 0.1);
    let lm = Landmark {
        f1: 100.0,
        f2: 200.0,
        dt: 0.5,
        t_anchor: 1.0,
    };
    let query_map = QueryHashMap::build(&hasher, &[lm], 2);
    let records = vec![FingerprintRecord::new(HashKey::new(0, 0, 0), "s", 0.5)];
    assert!(matcher(1).tally(&query_map, &records).is_empty());
}

#[tokio::test]
async fn test_batch_lookup_equals_union_of_single_lookups() {
    let a = landmarks(11, 10);
    let b = landmarks(12, 10);
    let index = index_with(&[("a", &a), ("b", &b)]).await;

    let hasher = LandmarkHasher::new(10.0, 0.1);
    let keys: HashSet<HashKey> = a.iter().take(40).map(|lm| hasher.hash(lm)).collect();

    let mut batched = index.lookup_many(&keys).await.unwrap();
    let mut single = Vec::new();
    for key in &keys {
        single.extend(index.lookup(key).await.unwrap());
    }

    let order = |x: &FingerprintRecord, y: &FingerprintRecord| {
        (x.hash, &x.song_id)
            .cmp(&(y.hash, &y.song_id))
            .then(x.t_anchor.total_cmp(&y.t_anchor))
    };
    batched.sort_by(order);
    single.sort_by(order);
    assert_eq!(batched, single);
    assert!(!batched.is_empty());
}

#[tokio::test]
async fn test_query_is_deterministic() {
    let song = landmarks(21, 20);
    let index = index_with(&[("x", &song), ("y", &landmarks(22, 20))]).await;
    let m = matcher(10);
    let first = m.query(&index, &song[..200]).await.unwrap();
    for _ in 0..3 {
        assert_eq!(m.query(&index, &song[..200]).await.unwrap(), first);
    }
}

#[test]
fn test_result_json_shape() {
    let result = matcher(100).decide(&votes_at("a", 0, 5));
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["status"], "LOW_CONFIDENCE");
    assert_eq!(json["reason"], "below_vote_floor");
    assert!(json["song_id"].is_null());

    let json = serde_json::to_value(MatchResult::no_candidates()).unwrap();
    assert_eq!(json["status"], "NOT_IN_DB");
    assert!(json.get("offset_seconds").is_none());
}
