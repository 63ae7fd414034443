pub mod concepts;
pub mod examples;
pub mod patterns;
pub mod prompt;
pub mod schema;

use std::sync::Arc;

use crate::metadata::client::MetadataClient;
use crate::metadata::models::{BusinessRule, Concept, Example, JoinHint, QueryPattern};
use crate::metadata::StoreError;

/// A concept recognized in the question, with match confidence.
#[derive(Debug, Clone)]
pub struct MatchedConcept {
    pub concept: Concept,
    pub matched_term: String,
    pub confidence: f64,
}

#[derive(Debug, Clone)]
pub struct ResolvedColumn {
    pub table: String,
    pub column: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct NamedFormula {
    pub name: String,
    pub expression: String,
}

/// Schema fragments the question resolved to: tables with their join hints,
/// individual column descriptors and named formulas.
#[derive(Debug, Clone, Default)]
pub struct ResolvedSchema {
    pub tables: Vec<crate::metadata::models::TableMetadata>,
    pub columns: Vec<ResolvedColumn>,
    pub joins: Vec<JoinHint>,
    pub formulas: Vec<NamedFormula>,
}

#[derive(Debug, Clone)]
pub struct ScoredPattern {
    pub pattern: QueryPattern,
    pub score: f64,
}

#[derive(Debug, Clone)]
pub struct ScoredExample {
    pub example: Example,
    pub score: f64,
}

/// Everything the generator needs about a question, plus the bounded prompt
/// rendering of it. The rendered text, not the raw records, is what goes to
/// the completion service.
#[derive(Debug, Clone)]
pub struct QueryContext {
    pub concepts: Vec<MatchedConcept>,
    pub schema: ResolvedSchema,
    pub patterns: Vec<ScoredPattern>,
    pub rules: Vec<BusinessRule>,
    pub examples: Vec<ScoredExample>,
    pub rendered_prompt: String,
}

/// How many historical examples to sample before overlap scoring.
const EXAMPLE_SAMPLE: usize = 30;

pub struct ContextBuilder {
    metadata: Arc<MetadataClient>,
}

impl ContextBuilder {
    pub fn new(metadata: Arc<MetadataClient>) -> Self {
        Self { metadata }
    }

    pub async fn build(&self, question: &str) -> Result<QueryContext, StoreError> {
        let known_concepts = self.metadata.concepts().await?;
        let tables = self.metadata.tables().await?;
        let known_patterns = self.metadata.patterns().await?;
        let known_rules = self.metadata.rules().await?;
        let history = self.metadata.successful_examples(EXAMPLE_SAMPLE).await?;

        let matched = concepts::extract(question, &known_concepts);
        self.metadata
            .bump_usage(matched.iter().map(|m| m.concept.id).collect());

        let resolved = schema::resolve(&matched, &tables);
        let patterns = patterns::score(question, &known_patterns);
        let rules = select_rules(&known_rules, &matched);
        let examples = examples::retrieve(question, history);

        let rendered_prompt =
            prompt::render(question, &matched, &resolved, &patterns, &rules, &examples);

        Ok(QueryContext {
            concepts: matched,
            schema: resolved,
            patterns,
            rules,
            examples,
            rendered_prompt,
        })
    }
}

/// A rule applies when its declared entity kinds intersect the matched
/// concepts' schema targets.
pub fn select_rules(rules: &[BusinessRule], matched: &[MatchedConcept]) -> Vec<BusinessRule> {
    rules
        .iter()
        .filter(|rule| {
            rule.entity_kinds
                .iter()
                .any(|kind| matched.iter().any(|m| &m.concept.target == kind))
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::models::TargetKind;

    fn concept(id: i64, target: &str) -> MatchedConcept {
        MatchedConcept {
            concept: Concept {
                id,
                term_en: Some("revenue".to_string()),
                term_es: None,
                target_kind: TargetKind::Column,
                target: target.to_string(),
                priority: 1,
                usage_count: 0,
                active: true,
            },
            matched_term: "revenue".to_string(),
            confidence: 0.9,
        }
    }

    fn rule(id: i64, kinds: &[&str]) -> BusinessRule {
        BusinessRule {
            id,
            name: format!("rule_{}", id),
            condition: "condition".to_string(),
            entity_kinds: kinds.iter().map(|k| k.to_string()).collect(),
            active: true,
        }
    }

    #[test]
    fn rule_applies_when_targets_intersect() {
        let rules = vec![
            rule(1, &["ad_sales.amount"]),
            rule(2, &["products.category"]),
        ];
        let matched = vec![concept(1, "ad_sales.amount")];

        let selected = select_rules(&rules, &matched);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].id, 1);
    }

    #[test]
    fn no_concepts_selects_no_rules() {
        let rules = vec![rule(1, &["ad_sales.amount"])];
        assert!(select_rules(&rules, &[]).is_empty());
    }
}
