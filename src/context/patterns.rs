//! Query pattern matching: scores every known pattern against the question
//! and keeps the best few.

use crate::context::ScoredPattern;
use crate::metadata::models::QueryPattern;
use crate::util::text::word_overlap;

const KEYWORD_WEIGHT: f64 = 0.3;
const CATEGORY_BONUS: f64 = 0.2;
const EXAMPLE_OVERLAP_WEIGHT: f64 = 0.3;
const SUCCESS_RATE_WEIGHT: f64 = 0.1;
const SCORE_FLOOR: f64 = 0.2;
const MAX_PATTERNS: usize = 3;

const RANKING_HINTS: &[&str] = &[
    "top", "best", "highest", "lowest", "worst", "ranking", "mejores", "peores",
];
const COMPARISON_HINTS: &[&str] = &[
    "compare", "versus", "vs", "between", "difference", "comparar", "diferencia",
];
const BREAKDOWN_HINTS: &[&str] = &["by ", "per ", "breakdown", "split", "share", "por "];

pub fn score(question: &str, patterns: &[QueryPattern]) -> Vec<ScoredPattern> {
    let q = question.to_lowercase();

    let mut scored: Vec<ScoredPattern> = patterns
        .iter()
        .filter(|p| p.active)
        .filter_map(|pattern| {
            let mut score = 0.0;

            for keyword in &pattern.intent_keywords {
                if q.contains(&keyword.to_lowercase()) {
                    score += KEYWORD_WEIGHT;
                }
            }

            score += category_bonus(&q, pattern);

            let best_overlap = pattern
                .example_questions
                .iter()
                .map(|ex| word_overlap(question, ex))
                .fold(0.0, f64::max);
            score += EXAMPLE_OVERLAP_WEIGHT * best_overlap;

            score += SUCCESS_RATE_WEIGHT * pattern.success_rate();

            if score > SCORE_FLOOR {
                Some(ScoredPattern {
                    pattern: pattern.clone(),
                    score,
                })
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
    scored.truncate(MAX_PATTERNS);
    scored
}

/// Heuristic bonus when the question's shape matches the pattern family.
fn category_bonus(q: &str, pattern: &QueryPattern) -> f64 {
    let hints: &[&str] = if pattern.name.contains("rank") {
        RANKING_HINTS
    } else if pattern.name.contains("comparison") {
        COMPARISON_HINTS
    } else if pattern.name.contains("breakdown") {
        BREAKDOWN_HINTS
    } else {
        return 0.0;
    };

    if hints.iter().any(|h| q.contains(h)) {
        CATEGORY_BONUS
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(id: i64, name: &str, keywords: &[&str], examples: &[&str]) -> QueryPattern {
        QueryPattern {
            id,
            name: name.to_string(),
            intent_keywords: keywords.iter().map(|k| k.to_string()).collect(),
            intent: String::new(),
            sql_template: String::new(),
            parameters: vec![],
            example_questions: examples.iter().map(|e| e.to_string()).collect(),
            success_count: 0,
            failure_count: 0,
            active: true,
        }
    }

    #[test]
    fn keyword_and_category_signals_rank_the_right_pattern_first() {
        let patterns = vec![
            pattern(1, "top_n_ranking", &["top", "best"], &["top 5 publishers"]),
            pattern(2, "period_comparison", &["compare"], &["compare months"]),
        ];
        let scored = score("top publishers by revenue", &patterns);
        assert_eq!(scored[0].pattern.id, 1);
    }

    #[test]
    fn low_scoring_patterns_are_dropped() {
        let patterns = vec![pattern(1, "period_comparison", &["compare"], &[])];
        assert!(score("revenue for march", &patterns).is_empty());
    }

    #[test]
    fn at_most_three_patterns_are_returned() {
        let patterns: Vec<QueryPattern> = (1..=5)
            .map(|id| pattern(id, "breakdown", &["by"], &["revenue by publisher"]))
            .collect();
        let scored = score("revenue by publisher", &patterns);
        assert!(scored.len() <= 3);
    }

    #[test]
    fn success_rate_breaks_ties() {
        let mut winner = pattern(1, "breakdown_a", &["by"], &[]);
        winner.success_count = 9;
        winner.failure_count = 1;
        let loser = pattern(2, "breakdown_b", &["by"], &[]);

        let scored = score("quantity by format", &[loser, winner]);
        assert_eq!(scored[0].pattern.id, 1);
    }
}
