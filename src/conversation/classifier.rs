//! Follow-up vs. new-topic classification.
//!
//! A rule cascade evaluated in fixed order, each rule a pure predicate
//! returning `Option<Classification>`; the first match wins. Cheap lexical
//! signals run before the low-confidence default because a wrong follow-up
//! call risks dragging a previous query's stale filters into the new SQL.

use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

use crate::conversation::SessionContext;
use crate::util::text::word_overlap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    FollowUp,
    NewTopic,
}

#[derive(Debug, Clone, Serialize)]
pub struct Classification {
    pub kind: QuestionKind,
    pub confidence: f64,
    pub reason: String,
}

impl Classification {
    fn follow_up(confidence: f64, reason: &str) -> Self {
        Self {
            kind: QuestionKind::FollowUp,
            confidence,
            reason: reason.to_string(),
        }
    }

    fn new_topic(confidence: f64, reason: &str) -> Self {
        Self {
            kind: QuestionKind::NewTopic,
            confidence,
            reason: reason.to_string(),
        }
    }
}

/// Words asking to modify the previous query. English and Spanish.
const MODIFICATION_KEYWORDS: &[&str] = &[
    "instead",
    "also add",
    "add ",
    "remove",
    "change",
    "exclude",
    "without",
    "only keep",
    "en lugar",
    "agrega",
    "quita",
    "cambia",
    "excluye",
    "sin ",
];

/// Words referring back to the previous result; matched as whole words.
const REFERENCE_WORDS: &[&str] = &[
    "it", "that", "those", "them", "same", "previous", "these", "eso", "esos", "mismo", "anterior",
];

const SHORT_QUESTION_CHARS: usize = 100;
const VERY_SHORT_QUESTION_CHARS: usize = 50;

type Rule = fn(&str, &SessionContext) -> Option<Classification>;

/// Ordered cascade; precedence is part of the contract.
const CASCADE: &[Rule] = &[
    no_prior_context,
    modification_keyword,
    reference_word,
    short_with_time_period,
    very_short,
    lexical_overlap_with_previous,
];

pub fn classify(question: &str, context: &SessionContext) -> Classification {
    for rule in CASCADE {
        if let Some(classification) = rule(question, context) {
            return classification;
        }
    }
    Classification::new_topic(0.6, "no follow-up signal matched")
}

fn no_prior_context(_question: &str, context: &SessionContext) -> Option<Classification> {
    if !context.has_context {
        Some(Classification::new_topic(1.0, "no prior conversation"))
    } else {
        None
    }
}

fn modification_keyword(question: &str, _context: &SessionContext) -> Option<Classification> {
    let q = question.to_lowercase();
    MODIFICATION_KEYWORDS
        .iter()
        .find(|kw| q.contains(*kw))
        .map(|kw| Classification::follow_up(0.9, &format!("modification keyword '{}'", kw.trim())))
}

fn reference_word(question: &str, _context: &SessionContext) -> Option<Classification> {
    let tokens = crate::util::text::tokenize(question);
    REFERENCE_WORDS
        .iter()
        .find(|w| tokens.iter().any(|t| t == *w))
        .map(|w| Classification::follow_up(0.85, &format!("references previous result ('{}')", w)))
}

fn short_with_time_period(question: &str, _context: &SessionContext) -> Option<Classification> {
    if question.chars().count() < SHORT_QUESTION_CHARS && has_time_period_token(question) {
        Some(Classification::follow_up(
            0.8,
            "short question naming a time period",
        ))
    } else {
        None
    }
}

fn very_short(question: &str, _context: &SessionContext) -> Option<Classification> {
    if question.chars().count() < VERY_SHORT_QUESTION_CHARS {
        Some(Classification::follow_up(0.7, "very short question"))
    } else {
        None
    }
}

fn lexical_overlap_with_previous(
    question: &str,
    context: &SessionContext,
) -> Option<Classification> {
    let previous = context.last_user_question()?;
    if word_overlap(question, previous) > 0.0 {
        Some(Classification::follow_up(
            0.75,
            "shares vocabulary with the previous question",
        ))
    } else {
        None
    }
}

fn has_time_period_token(question: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(january|february|march|april|may|june|july|august|september|october|november|december|enero|febrero|marzo|abril|mayo|junio|julio|agosto|septiembre|octubre|noviembre|diciembre|q[1-4]|quarter|month|year|mes|trimestre|20\d{2})\b",
        )
        .unwrap()
    });
    re.is_match(question)
}
