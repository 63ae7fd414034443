//! Renders the assembled context into one bounded text block. This text,
//! not the raw catalog records, is what the completion service sees, so the
//! prompt size stays independent of catalog size.

use crate::context::{MatchedConcept, ResolvedSchema, ScoredExample, ScoredPattern};
use crate::metadata::models::BusinessRule;

const MAX_CONCEPTS: usize = 8;
const MAX_COLUMNS_PER_TABLE: usize = 16;
const MAX_PROMPT_CHARS: usize = 6000;

pub fn render(
    question: &str,
    concepts: &[MatchedConcept],
    schema: &ResolvedSchema,
    patterns: &[ScoredPattern],
    rules: &[BusinessRule],
    examples: &[ScoredExample],
) -> String {
    let mut out = String::new();

    if !concepts.is_empty() {
        out.push_str("# RECOGNIZED CONCEPTS\n\n");
        for m in concepts.iter().take(MAX_CONCEPTS) {
            out.push_str(&format!(
                "- \"{}\" -> {} ({})\n",
                m.matched_term,
                m.concept.target,
                m.concept.target_kind.as_str()
            ));
        }
        out.push('\n');
    }

    out.push_str("# DATABASE SCHEMA\n\n");
    for table in &schema.tables {
        out.push_str(&format!("## Table: {}\n", table.name));
        if !table.description.is_empty() {
            out.push_str(&format!("{}\n", table.description));
        }
        out.push_str("\n| Column | Type | Description |\n|---|---|---|\n");
        for column in table.columns.iter().take(MAX_COLUMNS_PER_TABLE) {
            out.push_str(&format!(
                "| {} | {} | {} |\n",
                column.name, column.data_type, column.description
            ));
        }
        out.push('\n');
    }

    if !schema.joins.is_empty() {
        out.push_str("## Joins\n\n");
        for join in &schema.joins {
            out.push_str(&format!(
                "- {} {} ON {}\n",
                join.join_kind, join.target_table, join.predicate
            ));
        }
        out.push('\n');
    }

    if !schema.formulas.is_empty() {
        out.push_str("## Named formulas\n\n");
        for formula in &schema.formulas {
            out.push_str(&format!("- {} = {}\n", formula.name, formula.expression));
        }
        out.push('\n');
    }

    if !patterns.is_empty() {
        out.push_str("# QUERY PATTERNS\n\n");
        for scored in patterns {
            out.push_str(&format!(
                "## {}\n{}\nTemplate:\n```sql\n{}\n```\n\n",
                scored.pattern.name, scored.pattern.intent, scored.pattern.sql_template
            ));
        }
    }

    if !rules.is_empty() {
        out.push_str("# BUSINESS RULES\n\n");
        for rule in rules {
            out.push_str(&format!("- {}: {}\n", rule.name, rule.condition));
        }
        out.push('\n');
    }

    if !examples.is_empty() {
        out.push_str("# SIMILAR PAST QUESTIONS\n\n");
        for scored in examples {
            out.push_str(&format!(
                "Q: {}\n```sql\n{}\n```\n\n",
                scored.example.question, scored.example.sql
            ));
        }
    }

    out.push_str(&format!("# QUESTION\n\n{}\n", question));

    truncate_chars(out, MAX_PROMPT_CHARS)
}

fn truncate_chars(s: String, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s;
    }
    s.chars().take(max_chars).collect()
}
