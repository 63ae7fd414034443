use std::collections::HashSet;

/// Words carrying no analytical meaning, filtered before lexical overlap
/// scoring. English plus Spanish, matching the supported concept languages.
const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "how", "in", "is", "it", "me",
    "of", "on", "or", "show", "that", "the", "their", "them", "then", "this", "to", "was", "what",
    "which", "with", "you", "de", "del", "el", "en", "es", "la", "las", "lo", "los", "mi",
    "para", "por", "que", "se", "un", "una", "y",
];

/// Lowercased alphanumeric tokens of a question.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

/// Tokens with stop words removed, as a set.
pub fn content_tokens(text: &str) -> HashSet<String> {
    tokenize(text)
        .into_iter()
        .filter(|t| !STOP_WORDS.contains(&t.as_str()))
        .collect()
}

/// Jaccard similarity over stop-word-filtered tokens, in [0, 1].
pub fn word_overlap(a: &str, b: &str) -> f64 {
    let ta = content_tokens(a);
    let tb = content_tokens(b);
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let shared = ta.intersection(&tb).count();
    let total = ta.union(&tb).count();
    shared as f64 / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_splits_on_punctuation_and_lowercases() {
        assert_eq!(
            tokenize("Top 5 publishers, by Revenue!"),
            vec!["top", "5", "publishers", "by", "revenue"]
        );
    }

    #[test]
    fn overlap_ignores_stop_words() {
        // "the" and "by" contribute nothing; "revenue" and "publisher" do.
        let s = word_overlap("revenue by publisher", "the publisher revenue");
        assert!((s - 1.0).abs() < 1e-9);
    }

    #[test]
    fn overlap_of_disjoint_questions_is_zero() {
        assert_eq!(word_overlap("revenue by month", "slowest campaigns"), 0.0);
    }

    #[test]
    fn overlap_is_bounded() {
        let s = word_overlap("compare revenue october november", "compare quantity october");
        assert!(s > 0.0 && s < 1.0);
    }
}
