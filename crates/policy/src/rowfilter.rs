//! Row-filter template compilation and statement augmentation.
//!
//! A table's `rowFilter` is a predicate template with `{name}` placeholders.
//! Placeholders bind only to values the system itself knows at request time
//! (the `FilterContext`), never to anything taken from the agent's query or
//! purpose text. A placeholder with no binding is a configuration error —
//! the statement must not run unfiltered.
//!
//! Compilation is deterministic: the same (table, policy, context) triple
//! always yields the same fragment.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use tableward_core::{ConfigurationError, Operation, PolicyViolation, TablePolicy};

use crate::classifier::mask_literals;

/// Closed set of named bindings resolved by the system at request time.
///
/// Keys are placeholder names; values are substituted verbatim apart from
/// SQL single-quote escaping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterContext {
    bindings: BTreeMap<String, String>,
}

impl FilterContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.bindings.insert(name.into(), value.into());
        self
    }

    pub fn bind(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.bindings.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.bindings.get(name).map(String::as_str)
    }

    /// The bound values, used by the tool boundary to scrub driver error
    /// messages before they reach the model.
    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.bindings.values().map(String::as_str)
    }
}

/// A compiled predicate for one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableFilter {
    pub table: String,
    pub fragment: String,
}

/// Expand a table's filter template against the context. `None` when the
/// table has no filter configured.
pub fn compile(
    table: &str,
    policy: &TablePolicy,
    context: &FilterContext,
) -> Result<Option<String>, ConfigurationError> {
    let Some(template) = policy.row_filter.as_deref() else {
        return Ok(None);
    };
    if template.trim().is_empty() {
        return Ok(None);
    }

    let mut fragment = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        fragment.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let end = after.find('}').ok_or_else(|| {
            ConfigurationError::MalformedPolicy(format!(
                "row filter for '{table}' has an unclosed placeholder"
            ))
        })?;
        let name = &after[..end];
        let value =
            context
                .get(name)
                .ok_or_else(|| ConfigurationError::UnboundPlaceholder {
                    table: table.to_string(),
                    placeholder: name.to_string(),
                })?;
        fragment.push_str(&value.replace('\'', "''"));
        rest = &after[end + 1..];
    }
    fragment.push_str(rest);
    Ok(Some(fragment))
}

/// Compile the filters for every referenced table that has one.
pub fn compile_filters(
    tables: &[String],
    policy: &tableward_core::PolicyConfig,
    context: &FilterContext,
) -> Result<Vec<TableFilter>, ConfigurationError> {
    let mut filters = Vec::new();
    for table in tables {
        if let Some(table_policy) = policy.table_policy(table) {
            if let Some(fragment) = compile(table, table_policy, context)? {
                filters.push(TableFilter {
                    table: table.clone(),
                    fragment,
                });
            }
        }
    }
    Ok(filters)
}

/// Conjoin the compiled filters with the statement's own predicate.
///
/// The net effect must be that returned and affected rows are always
/// restricted to the compiled predicate, so anything this splice cannot
/// guarantee is rejected: INSERT (a WHERE fragment cannot restrict inserted
/// rows) and statements referencing more than one table (the fragment
/// cannot be attributed to the right scope in a join).
pub fn augment_statement(
    query: &str,
    operation: Operation,
    referenced_tables: &[String],
    filters: &[TableFilter],
) -> Result<String, PolicyViolation> {
    if filters.is_empty() {
        return Ok(query.to_string());
    }
    let table = filters[0].table.clone();
    if operation == Operation::Insert {
        return Err(PolicyViolation::FilterUnenforceable { table });
    }
    if referenced_tables.len() > 1 {
        return Err(PolicyViolation::FilterUnenforceable { table });
    }

    let fragment = &filters[0].fragment;
    let masked = mask_literals(query)?;
    let end = statement_end(&masked);

    match top_level_keyword(&masked, where_pattern()) {
        Some(m) => {
            // WHERE <predicate> → WHERE (<fragment>) AND (<predicate>)
            let predicate_start = m.end;
            let predicate_end = top_level_keyword_from(&masked, clause_pattern(), m.end)
                .map(|c| c.start)
                .unwrap_or(end);
            let predicate = query[predicate_start..predicate_end].trim();
            if predicate.is_empty() {
                return Err(PolicyViolation::Unclassifiable {
                    reason: "WHERE clause has no predicate".into(),
                });
            }
            let mut out = String::with_capacity(query.len() + fragment.len() + 16);
            out.push_str(&query[..m.start]);
            out.push_str("WHERE (");
            out.push_str(fragment);
            out.push_str(") AND (");
            out.push_str(predicate);
            out.push(')');
            push_suffix(&mut out, &query[predicate_end..]);
            Ok(out)
        }
        None => {
            let insert_at = top_level_keyword(&masked, clause_pattern())
                .map(|c| c.start)
                .unwrap_or(end);
            let mut out = String::with_capacity(query.len() + fragment.len() + 8);
            out.push_str(query[..insert_at].trim_end());
            out.push_str(" WHERE ");
            out.push_str(fragment);
            push_suffix(&mut out, &query[insert_at..]);
            Ok(out)
        }
    }
}

fn push_suffix(out: &mut String, suffix: &str) {
    let suffix = suffix.trim_start();
    if suffix.is_empty() {
        return;
    }
    if suffix != ";" {
        out.push(' ');
    }
    out.push_str(suffix);
}

struct KeywordMatch {
    start: usize,
    end: usize,
}

fn where_pattern() -> &'static Regex {
    static WHERE: OnceLock<Regex> = OnceLock::new();
    WHERE.get_or_init(|| {
        Regex::new(r"(?i)\bwhere\b").unwrap_or_else(|e| panic!("where pattern: {e}"))
    })
}

fn clause_pattern() -> &'static Regex {
    static CLAUSE: OnceLock<Regex> = OnceLock::new();
    CLAUSE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:group|order|limit|having|offset|union|returning|fetch)\b")
            .unwrap_or_else(|e| panic!("clause pattern: {e}"))
    })
}

fn top_level_keyword(masked: &str, pattern: &Regex) -> Option<KeywordMatch> {
    top_level_keyword_from(masked, pattern, 0)
}

/// First match of `pattern` at paren depth zero, at or after `from`.
fn top_level_keyword_from(
    masked: &str,
    pattern: &Regex,
    from: usize,
) -> Option<KeywordMatch> {
    for m in pattern.find_iter(masked) {
        if m.start() < from {
            continue;
        }
        let prefix = &masked[..m.start()];
        let depth = prefix.matches('(').count() as i64 - prefix.matches(')').count() as i64;
        if depth == 0 {
            return Some(KeywordMatch {
                start: m.start(),
                end: m.end(),
            });
        }
    }
    None
}

/// Byte offset where the statement proper ends (before a trailing `;`).
fn statement_end(masked: &str) -> usize {
    let trimmed = masked.trim_end();
    if let Some(stripped) = trimmed.strip_suffix(';') {
        stripped.trim_end().len()
    } else {
        trimmed.len()
    }
}
