//! SQL projection rewriting.
//!
//! Export scripts project a single `"LineFile"` column. When the user picks a
//! custom column set, the projection is spliced out and replaced with a
//! delimited, escaped concatenation of the selected column expressions. This
//! is a pure text transform; the SQL is never parsed.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::collections::HashMap;
use thiserror::Error;

static LINE_FILE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\bSELECT\s+"LineFile""#).expect("projection pattern is valid")
});

const LINE_FILE_TOKEN: &str = "\"LineFile\"";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RewriteError {
    #[error("script is not modifiable: SQL must start with SELECT \"LineFile\"")]
    NotModifiable,

    #[error("script is not modifiable: \"LineFile\" not found")]
    TokenNotFound,

    #[error("script is not modifiable: no valid column expressions")]
    NoUsableColumns,
}

/// Substitution strings for characters that would break the delimited output.
#[derive(Debug, Clone)]
pub struct EscapeRules {
    pub backslash: String,
    pub pipe: String,
    pub cr: String,
    pub lf: String,
}

impl Default for EscapeRules {
    fn default() -> Self {
        Self {
            backslash: r"\\".to_string(),
            pipe: r"\|".to_string(),
            cr: r"\\r".to_string(),
            lf: r"\\n".to_string(),
        }
    }
}

/// Everything the rewrite needs: which column items were selected, how each
/// item id maps to a SQL expression, and the serialization rules.
#[derive(Debug, Clone)]
pub struct RewriteContext {
    pub selected_column_item_ids: Vec<String>,
    pub id_to_expression: HashMap<String, String>,
    pub delimiter: String,
    pub escape: EscapeRules,
}

impl Default for RewriteContext {
    fn default() -> Self {
        Self {
            selected_column_item_ids: Vec::new(),
            id_to_expression: HashMap::new(),
            delimiter: "|".to_string(),
            escape: EscapeRules::default(),
        }
    }
}

/// Rewrites the `"LineFile"` projection into a concatenation of the selected
/// column expressions. With no context or an empty selection the SQL is
/// returned unchanged.
pub fn rewrite_projection(
    sql: &str,
    context: Option<&RewriteContext>,
) -> Result<String, RewriteError> {
    let context = match context {
        Some(c) if !c.selected_column_item_ids.is_empty() => c,
        _ => return Ok(sql.to_string()),
    };

    if !LINE_FILE_PATTERN.is_match(sql) {
        return Err(RewriteError::NotModifiable);
    }

    // The pattern match is case-insensitive but the splice point is the
    // exact-cased token.
    let token_start = sql.find(LINE_FILE_TOKEN).ok_or(RewriteError::TokenNotFound)?;
    let token_end = token_start + LINE_FILE_TOKEN.len();

    let parts: Vec<String> = context
        .selected_column_item_ids
        .iter()
        .filter_map(|id| context.id_to_expression.get(id))
        .map(|expr| wrap_coalesce_and_escape(expr, &context.escape))
        .collect();

    if parts.is_empty() {
        return Err(RewriteError::NoUsableColumns);
    }

    let delimiter = quote_embed(&context.delimiter);
    let concat = parts.join(&format!(" || '{delimiter}' || "));

    Ok(format!(
        "{}({concat}){}",
        &sql[..token_start],
        &sql[token_end..]
    ))
}

/// NULL-guards the expression, casts it to a fixed-width VARCHAR and escapes
/// the characters the delimited format reserves. The REPLACE order is fixed:
/// backslash, pipe, CR, LF.
fn wrap_coalesce_and_escape(expr: &str, escape: &EscapeRules) -> String {
    let inner = format!("COALESCE(CAST({expr} AS VARCHAR(4000)), '')");
    let b = quote_embed(&escape.backslash);
    let p = quote_embed(&escape.pipe);
    let r = quote_embed(&escape.cr);
    let n = quote_embed(&escape.lf);
    format!(
        "REPLACE(REPLACE(REPLACE(REPLACE({inner}, '\\', '{b}'), '|', '{p}'), CHR(13), '{r}'), CHR(10), '{n}')"
    )
}

/// Escapes a string for embedding inside a SQL single-quoted literal.
fn quote_embed(s: &str) -> String {
    s.replace('\'', "''")
}
