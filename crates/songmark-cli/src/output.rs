//! JSON output formatting

use serde::Serialize;
use songmark_core::{MatchResult, MatchStatus, SongMetadata};

use crate::common::BatchOutcome;
use crate::evaluation::Verdict;

/// Result of `smidentify`
#[derive(Debug, Serialize)]
pub struct IdentifyOutput {
    pub query_path: String,
    #[serde(flatten)]
    pub result: MatchResult,
    /// Stored metadata of the matched song
    #[serde(skip_serializing_if = "Option::is_none")]
    pub song: Option<SongMetadata>,
}

/// One indexed song
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexOutput {
    pub song_id: String,
    pub path: String,
    pub records: usize,
}

/// Summary of `smbatch`
#[derive(Debug, Default, Serialize)]
pub struct BatchOutput {
    pub indexed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub records: usize,
    pub songs: Vec<IndexOutput>,
}

impl BatchOutput {
    pub fn push(&mut self, song: IndexOutput) {
        self.indexed += 1;
        self.records += song.records;
        self.songs.push(song);
    }

    pub fn record(&mut self, outcome: BatchOutcome) {
        match outcome {
            BatchOutcome::Indexed(song) => self.push(song),
            BatchOutcome::Skipped => self.skipped += 1,
            BatchOutcome::Failed => self.failed += 1,
        }
    }
}

/// Decision for one labelled query of `smevaluate`
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    pub query_path: String,
    pub true_song: String,
    pub predicted: Option<String>,
    pub votes: u32,
    pub status: MatchStatus,
    pub verdict: Verdict,
}

/// Summary of `smevaluate`
#[derive(Debug, Default, Serialize)]
pub struct EvaluationOutput {
    pub total_queries: usize,
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    /// Queries whose audio could not be fingerprinted
    pub failed: usize,
    /// `true_positives / total_queries`
    pub accuracy: f64,
    pub queries: Vec<QueryOutcome>,
}

impl EvaluationOutput {
    pub fn push(&mut self, outcome: QueryOutcome) {
        self.total_queries += 1;
        match outcome.verdict {
            Verdict::TruePositive => self.true_positives += 1,
            Verdict::FalsePositive => self.false_positives += 1,
            Verdict::FalseNegative => self.false_negatives += 1,
        }
        self.accuracy = self.true_positives as f64 / self.total_queries as f64;
        self.queries.push(outcome);
    }
}

/// Print any result as pretty JSON on stdout
pub fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing result: {}", e),
    }
}
