//! Recognition accuracy over labelled query clips
//!
//! The evaluation directory holds one subdirectory per indexed song, named
//! by its song id, with WAV excerpts of that song:
//!
//! ```text
//! eval_dir/<song_id>/*.wav
//! ```

use anyhow::{Context, Result};
use serde::Serialize;
use songmark_core::{AudioSource, MatchResult, Recognizer};
use std::path::{Path, PathBuf};

use crate::common::wav_files;
use crate::output::{EvaluationOutput, QueryOutcome};

/// A query clip and the song it was cut from
#[derive(Debug, Clone, PartialEq)]
pub struct LabelledQuery {
    pub true_song: String,
    pub path: PathBuf,
}

/// How a query was decided relative to its label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Matched the labelled song
    TruePositive,
    /// Matched some other song
    FalsePositive,
    /// Not matched at all
    FalseNegative,
}

pub fn judge(true_song: &str, result: &MatchResult) -> Verdict {
    match result.song_id.as_deref() {
        Some(song_id) if result.is_match() && song_id == true_song => Verdict::TruePositive,
        Some(_) if result.is_match() => Verdict::FalsePositive,
        _ => Verdict::FalseNegative,
    }
}

/// All labelled queries below `eval_dir`, sorted by label then file name
pub fn labelled_queries(eval_dir: &Path) -> Result<Vec<LabelledQuery>> {
    let mut labels: Vec<(String, PathBuf)> = std::fs::read_dir(eval_dir)
        .with_context(|| format!("Failed to list {}", eval_dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .filter_map(|path| {
            let label = path.file_name()?.to_str()?.to_string();
            Some((label, path))
        })
        .collect();
    labels.sort();

    let mut queries = Vec::new();
    for (label, dir) in labels {
        for path in wav_files(&dir)? {
            queries.push(LabelledQuery {
                true_song: label.clone(),
                path,
            });
        }
    }
    Ok(queries)
}

/// Identify every query and tally the verdicts
///
/// Clips that cannot be fingerprinted are counted in `failed` and left out of
/// the accuracy; storage errors stop the run.
pub async fn evaluate(
    recognizer: &Recognizer,
    queries: &[LabelledQuery],
) -> Result<EvaluationOutput> {
    let mut summary = EvaluationOutput::default();

    for query in queries {
        let result = match recognizer
            .identify_song(AudioSource::Path(&query.path))
            .await
        {
            Ok(result) => result,
            Err(e) if e.is_input_error() => {
                log::error!("Failed to identify {}: {}", query.path.display(), e);
                summary.failed += 1;
                continue;
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to identify {}", query.path.display()))
            }
        };

        let verdict = judge(&query.true_song, &result);
        log::info!(
            "{} (label {}): {:?}, predicted {:?} with {} votes",
            query.path.display(),
            query.true_song,
            verdict,
            result.song_id,
            result.votes
        );

        summary.push(QueryOutcome {
            query_path: query.path.display().to_string(),
            true_song: query.true_song.clone(),
            predicted: result.song_id.clone(),
            votes: result.votes,
            status: result.status,
            verdict,
        });
    }

    Ok(summary)
}
