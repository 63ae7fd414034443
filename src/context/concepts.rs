//! Concept extraction: case-insensitive substring match of every known term
//! against the question, scored and deduplicated.

use std::collections::HashMap;

use crate::context::MatchedConcept;
use crate::metadata::models::Concept;

const BASE_CONFIDENCE: f64 = 0.5;
const LENGTH_BONUS_PER_CHAR: f64 = 0.02;
const LENGTH_BONUS_CAP: f64 = 0.3;
const WORD_BOUNDARY_BONUS: f64 = 0.3;

/// Matches every term of every active concept against the question.
/// Duplicate concept ids keep their best-scoring term; results come back
/// sorted by confidence, then priority. No match is an empty set, not an
/// error.
pub fn extract(question: &str, concepts: &[Concept]) -> Vec<MatchedConcept> {
    let haystack = question.to_lowercase();
    let mut best: HashMap<i64, MatchedConcept> = HashMap::new();

    for concept in concepts.iter().filter(|c| c.active) {
        for term in concept.terms() {
            let needle = term.to_lowercase();
            if needle.len() < 2 || !haystack.contains(&needle) {
                continue;
            }

            let mut confidence = BASE_CONFIDENCE
                + (needle.chars().count() as f64 * LENGTH_BONUS_PER_CHAR).min(LENGTH_BONUS_CAP);
            if has_word_boundary_match(&haystack, &needle) {
                confidence += WORD_BOUNDARY_BONUS;
            }
            let confidence = confidence.min(1.0);

            match best.get(&concept.id) {
                Some(existing) if existing.confidence >= confidence => {}
                _ => {
                    best.insert(
                        concept.id,
                        MatchedConcept {
                            concept: concept.clone(),
                            matched_term: term.to_string(),
                            confidence,
                        },
                    );
                }
            }
        }
    }

    let mut matched: Vec<MatchedConcept> = best.into_values().collect();
    matched.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.concept.priority.cmp(&a.concept.priority))
    });
    matched
}

/// True when some occurrence of `needle` in `haystack` is bounded by
/// non-alphanumeric characters (or the string edges) on both sides.
fn has_word_boundary_match(haystack: &str, needle: &str) -> bool {
    let mut from = 0;
    while let Some(pos) = haystack[from..].find(needle) {
        let start = from + pos;
        let end = start + needle.len();
        let left_ok = start == 0
            || haystack[..start]
                .chars()
                .next_back()
                .is_some_and(|c| !c.is_alphanumeric());
        let right_ok = end == haystack.len()
            || haystack[end..]
                .chars()
                .next()
                .is_some_and(|c| !c.is_alphanumeric());
        if left_ok && right_ok {
            return true;
        }
        from = end;
    }
    false
}
