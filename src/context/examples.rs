//! Few-shot retrieval over previously successful (question, SQL) pairs.

use crate::context::ScoredExample;
use crate::metadata::models::Example;
use crate::util::text::word_overlap;

const OVERLAP_FLOOR: f64 = 0.2;
const TOP_K: usize = 3;

/// Scores a bounded sample of historical examples by word overlap with the
/// question and keeps the top K above the floor.
pub fn retrieve(question: &str, history: Vec<Example>) -> Vec<ScoredExample> {
    let mut scored: Vec<ScoredExample> = history
        .into_iter()
        .filter_map(|example| {
            let score = word_overlap(question, &example.question);
            if score > OVERLAP_FLOOR {
                Some(ScoredExample { example, score })
            } else {
                None
            }
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(TOP_K);
    scored
}
