//! Resolves matched concepts into concrete schema fragments for the prompt.

use crate::context::{MatchedConcept, NamedFormula, ResolvedColumn, ResolvedSchema};
use crate::metadata::models::{TableMetadata, TargetKind};

/// The product dimension table, force-included for product/format questions
/// because its join is otherwise silently missing from generated SQL.
pub const PRODUCT_DIMENSION: &str = "products";

const PRODUCT_TERMS: &[&str] = &["product", "format", "producto", "formato"];

pub fn resolve(matched: &[MatchedConcept], tables: &[TableMetadata]) -> ResolvedSchema {
    let mut resolved = ResolvedSchema::default();

    for m in matched {
        match m.concept.target_kind {
            TargetKind::Column | TargetKind::Entity => {
                if let Some((table, column)) = m.concept.target.split_once('.') {
                    add_table(&mut resolved, tables, table);
                    let description = tables
                        .iter()
                        .find(|t| t.name == table)
                        .and_then(|t| t.columns.iter().find(|c| c.name == column))
                        .map(|c| c.description.clone())
                        .unwrap_or_default();
                    if !resolved
                        .columns
                        .iter()
                        .any(|c| c.table == table && c.column == column)
                    {
                        resolved.columns.push(ResolvedColumn {
                            table: table.to_string(),
                            column: column.to_string(),
                            description,
                        });
                    }
                }
            }
            TargetKind::Table => {
                add_table(&mut resolved, tables, &m.concept.target);
            }
            TargetKind::Expression => {
                let name = m.concept.display_term().to_string();
                if !resolved.formulas.iter().any(|f| f.name == name) {
                    resolved.formulas.push(NamedFormula {
                        name,
                        expression: m.concept.target.clone(),
                    });
                }
            }
        }
    }

    if matched.iter().any(is_product_related) {
        add_table(&mut resolved, tables, PRODUCT_DIMENSION);
    }

    resolved
}

fn is_product_related(m: &MatchedConcept) -> bool {
    if m.concept.target == PRODUCT_DIMENSION
        || m.concept.target.starts_with("products.")
    {
        return true;
    }
    let term = m.matched_term.to_lowercase();
    PRODUCT_TERMS.iter().any(|t| term.contains(t))
}

fn add_table(resolved: &mut ResolvedSchema, tables: &[TableMetadata], name: &str) {
    if resolved.tables.iter().any(|t| t.name == name) {
        return;
    }
    let Some(table) = tables.iter().find(|t| t.name == name) else {
        return;
    };
    resolved.tables.push(table.clone());
    for join in &table.joins {
        if !resolved
            .joins
            .iter()
            .any(|j| j.predicate == join.predicate)
        {
            resolved.joins.push(join.clone());
        }
    }
}
