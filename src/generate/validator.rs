//! Column-name validation and static repair.
//!
//! The two warehouse tables' column sets are the only identifiers the
//! generator may emit outside of computed aliases; everything else is
//! rejected before a warehouse round-trip is spent on it.

use regex::Regex;
use std::sync::OnceLock;

use crate::metadata::models::{LearnedRule, RuleKind};

pub const AD_SALES_COLUMNS: &[&str] = &[
    "sale_id",
    "sale_date",
    "sale_month",
    "sale_year",
    "publisher",
    "campaign",
    "product_id",
    "amount",
    "quantity",
];

pub const PRODUCT_COLUMNS: &[&str] = &[
    "product_id",
    "product_name",
    "format",
    "category",
    "unit_price",
];

pub const TABLES: &[&str] = &["ad_sales", "products"];

/// Well-known naming mistakes the models keep making, fixed textually
/// before validation. Matched on word boundaries, case-insensitively.
const STATIC_FIXES: &[(&str, &str)] = &[
    ("sales_date", "sale_date"),
    ("sell_date", "sale_date"),
    ("sales_month", "sale_month"),
    ("sales_year", "sale_year"),
    ("revenue_amount", "amount"),
    ("total_amount", "amount"),
    ("publisher_name", "publisher"),
    ("product_type", "format"),
    ("price", "unit_price"),
];

const SQL_KEYWORDS: &[&str] = &[
    "all", "and", "anti", "as", "asc", "asof", "avg", "between", "by", "case", "cast", "coalesce",
    "count", "cross", "cube", "current", "date", "day", "desc", "distinct", "else", "end",
    "except", "exists", "extract", "false", "filter", "first", "float", "from", "full", "group",
    "grouping", "having", "ilike", "in", "inner", "integer", "intersect", "interval", "is",
    "join", "last", "left", "like", "limit", "max", "min", "month", "natural", "not", "null",
    "nulls", "offset", "on", "or", "order", "outer", "over", "partition", "qualify", "right",
    "rollup", "row", "rows", "select", "semi", "stddev", "sum", "then", "true", "union", "using",
    "values", "varchar", "when", "where", "window", "with", "year",
];

/// Applies the static auto-fix table.
pub fn apply_static_fixes(sql: &str) -> String {
    let mut fixed = sql.to_string();
    for (wrong, right) in STATIC_FIXES {
        let re = fix_regex(wrong);
        fixed = re.replace_all(&fixed, *right).into_owned();
    }
    fixed
}

fn fix_regex(wrong: &str) -> Regex {
    // The fix table is static; these patterns always compile.
    Regex::new(&format!(r"(?i)\b{}\b", regex::escape(wrong))).unwrap()
}

/// Applies active learned rules by literal substitution. Returns the
/// rewritten SQL and the names of the corrections applied.
pub fn apply_learned_rules(sql: &str, rules: &[LearnedRule]) -> (String, Vec<String>) {
    let mut fixed = sql.to_string();
    let mut applied = Vec::new();

    for rule in rules.iter().filter(|r| r.active) {
        match rule.kind {
            RuleKind::ColumnFix | RuleKind::PatternFix => {
                if fixed.contains(&rule.pattern) {
                    fixed = fixed.replace(&rule.pattern, &rule.correction);
                    applied.push(format!("{} -> {}", rule.pattern, rule.correction));
                }
            }
            // Prompt hints influence generation, not post-processing.
            RuleKind::PromptHint => {}
        }
    }

    (fixed, applied)
}

/// Identifiers in the SQL that are neither allow-listed columns, known
/// tables, declared aliases, SQL keywords nor function names. Pure
/// function: running it twice on the same SQL yields the same set.
pub fn invalid_columns(sql: &str) -> Vec<String> {
    let cleaned = strip_string_literals(sql).to_lowercase();
    let aliases = collect_aliases(&cleaned);

    let mut invalid: Vec<String> = Vec::new();
    for m in ident_regex().find_iter(&cleaned) {
        let token = m.as_str();
        if SQL_KEYWORDS.contains(&token)
            || TABLES.contains(&token)
            || AD_SALES_COLUMNS.contains(&token)
            || PRODUCT_COLUMNS.contains(&token)
            || aliases.iter().any(|a| a == token)
        {
            continue;
        }
        match next_meaningful_char(&cleaned, m.end()) {
            // Function call or qualifier; not a column reference.
            Some('(') | Some('.') => continue,
            _ => {}
        }
        if !invalid.iter().any(|i| i == token) {
            invalid.push(token.to_string());
        }
    }
    invalid
}

fn ident_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[a-z_][a-z0-9_]*").unwrap())
}

fn next_meaningful_char(s: &str, from: usize) -> Option<char> {
    s[from..].chars().find(|c| !c.is_whitespace())
}

fn strip_string_literals(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut in_literal = false;
    for c in sql.chars() {
        match c {
            '\'' => {
                in_literal = !in_literal;
                out.push(' ');
            }
            _ if in_literal => out.push(' '),
            _ => out.push(c),
        }
    }
    out
}

/// Aliases declared in the statement: `AS name`, bare table aliases after
/// FROM/JOIN, and CTE names.
fn collect_aliases(sql: &str) -> Vec<String> {
    static AS_RE: OnceLock<Regex> = OnceLock::new();
    static TABLE_ALIAS_RE: OnceLock<Regex> = OnceLock::new();
    static CTE_RE: OnceLock<Regex> = OnceLock::new();

    let as_re = AS_RE.get_or_init(|| Regex::new(r"\bas\s+([a-z_][a-z0-9_]*)").unwrap());
    let table_alias_re = TABLE_ALIAS_RE.get_or_init(|| {
        Regex::new(r"\b(?:from|join)\s+[a-z_][a-z0-9_]*\s+(?:as\s+)?([a-z_][a-z0-9_]*)").unwrap()
    });
    let cte_re =
        CTE_RE.get_or_init(|| Regex::new(r"(?:\bwith|,)\s*([a-z_][a-z0-9_]*)\s+as\s*\(").unwrap());

    let mut aliases = Vec::new();
    for re in [as_re, table_alias_re, cte_re] {
        for cap in re.captures_iter(sql) {
            let name = cap[1].to_string();
            if !SQL_KEYWORDS.contains(&name.as_str()) && !aliases.contains(&name) {
                aliases.push(name);
            }
        }
    }
    aliases
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_sql_has_no_invalid_columns() {
        let sql = "SELECT publisher, SUM(amount) AS total \
                   FROM ad_sales \
                   LEFT JOIN products ON ad_sales.product_id = products.product_id \
                   WHERE sale_year = 2024 GROUP BY publisher ORDER BY total DESC";
        assert!(invalid_columns(sql).is_empty());
    }

    #[test]
    fn unknown_column_is_reported_by_name() {
        let sql = "SELECT impressions FROM ad_sales";
        assert_eq!(invalid_columns(sql), vec!["impressions".to_string()]);
    }

    #[test]
    fn aliases_and_qualified_names_are_not_flagged() {
        let sql = "SELECT s.publisher, p.format, SUM(s.amount) AS net \
                   FROM ad_sales s JOIN products p ON s.product_id = p.product_id \
                   GROUP BY s.publisher, p.format HAVING net > 0";
        assert!(invalid_columns(sql).is_empty());
    }

    #[test]
    fn string_literals_are_ignored() {
        let sql = "SELECT amount FROM ad_sales WHERE publisher = 'mystery_identifier'";
        assert!(invalid_columns(sql).is_empty());
    }

    #[test]
    fn validator_is_idempotent() {
        let sql = "SELECT impressions, clicks FROM ad_sales";
        assert_eq!(invalid_columns(sql), invalid_columns(sql));
        assert_eq!(
            invalid_columns(sql),
            vec!["impressions".to_string(), "clicks".to_string()]
        );
    }

    #[test]
    fn static_fix_rewrites_known_mistakes_only() {
        let fixed = apply_static_fixes("SELECT total_amount, unit_price FROM ad_sales");
        assert_eq!(fixed, "SELECT amount, unit_price FROM ad_sales");
    }

    #[test]
    fn static_fix_respects_word_boundaries() {
        // "price" inside "unit_price" must not be rewritten again.
        let fixed = apply_static_fixes("SELECT unit_price, price FROM products");
        assert_eq!(fixed, "SELECT unit_price, unit_price FROM products");
    }

    #[test]
    fn learned_rules_apply_only_when_active() {
        let rules = vec![
            LearnedRule {
                id: 1,
                kind: RuleKind::ColumnFix,
                pattern: "montly_total".to_string(),
                correction: "amount".to_string(),
                occurrences: 5,
                active: true,
            },
            LearnedRule {
                id: 2,
                kind: RuleKind::ColumnFix,
                pattern: "amount".to_string(),
                correction: "broken".to_string(),
                occurrences: 3,
                active: false,
            },
        ];
        let (fixed, applied) = apply_learned_rules("SELECT montly_total FROM ad_sales", &rules);
        assert_eq!(fixed, "SELECT amount FROM ad_sales");
        assert_eq!(applied.len(), 1);
    }
}
