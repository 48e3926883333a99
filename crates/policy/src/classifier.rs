//! Statement classifier — decides whether a statement may touch the database.
//!
//! The classifier is a pure decision function over the statement text and a
//! policy snapshot. It extracts every referenced table, verifies the
//! statement operation and (where the policy restricts them) the requested
//! columns, and rejects the whole statement on the first rule that fails —
//! partial execution against a mix of allowed and denied tables is never
//! permitted.
//!
//! This is deliberately not a SQL parser. Validation happens at the level of
//! "which tables and columns does this statement reference", via a literal
//! mask plus a token walk. Anything the walk cannot confidently decompose
//! (CTEs, multi-statement batches, comments, unterminated strings) is
//! rejected as unclassifiable: fail closed, not open.

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;
use tableward_core::{Operation, PolicyConfig, PolicyViolation};
use tracing::debug;

/// Outcome of a successful classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub operation: Operation,

    /// Referenced tables, first-seen order, deduplicated case-insensitively.
    pub tables: Vec<String>,
}

/// Determine the statement operation from its leading keyword.
pub fn detect_operation(query: &str) -> Result<Operation, PolicyViolation> {
    let first = query
        .split_whitespace()
        .next()
        .ok_or_else(|| unclassifiable("empty statement"))?;

    match first.to_ascii_lowercase().as_str() {
        "select" => Ok(Operation::Select),
        "insert" => Ok(Operation::Insert),
        "update" => Ok(Operation::Update),
        "delete" => Ok(Operation::Delete),
        "with" => Err(unclassifiable(
            "common table expressions are not supported",
        )),
        other => Err(unclassifiable(format!(
            "unsupported statement '{other}'"
        ))),
    }
}

/// Classify a statement against a policy snapshot.
///
/// `operation` is the declared operation for the request; a statement whose
/// leading keyword disagrees is rejected rather than silently reinterpreted.
pub fn classify(
    query: &str,
    operation: Operation,
    policy: &PolicyConfig,
) -> Result<Classification, PolicyViolation> {
    let detected = detect_operation(query)?;
    if detected != operation {
        return Err(unclassifiable(format!(
            "declared operation {operation} does not match the statement ({detected})"
        )));
    }

    let masked = mask_literals(query)?;
    reject_unscannable(&masked)?;

    let tokens = tokenize(&masked);
    let refs = extract_table_refs(&tokens)?;

    if refs.tables.is_empty() && operation != Operation::Select {
        return Err(unclassifiable("no table reference found"));
    }

    for table in &refs.tables {
        if !policy.is_reachable(table) {
            return Err(PolicyViolation::TableDenied {
                table: table.clone(),
            });
        }
        // A reachable table with no entry (blacklist mode) permits all
        // operations; entries restrict to their operation set.
        if let Some(table_policy) = policy.table_policy(table) {
            if !table_policy.allows_operation(operation) {
                return Err(PolicyViolation::OperationDenied {
                    table: table.clone(),
                    operation,
                });
            }
        }
    }

    match operation {
        Operation::Select => check_select_columns(&tokens, &refs, policy)?,
        Operation::Update => check_update_columns(&tokens, &refs, policy)?,
        Operation::Insert => check_insert_columns(&tokens, &refs, policy)?,
        Operation::Delete => {}
    }

    debug!(operation = %operation, tables = ?refs.tables, "Statement classified");
    Ok(Classification {
        operation,
        tables: refs.tables,
    })
}

fn unclassifiable(reason: impl Into<String>) -> PolicyViolation {
    PolicyViolation::Unclassifiable {
        reason: reason.into(),
    }
}

/// Replace the contents of single-quoted string literals with spaces so the
/// scanner never mistakes literal text for keywords or table names.
/// Doubled quotes (`''`) inside a literal are handled; an unterminated
/// literal rejects the statement. The mask is byte-length-preserving, so
/// offsets into the masked text are valid offsets into the original.
pub(crate) fn mask_literals(query: &str) -> Result<String, PolicyViolation> {
    let mut out = String::with_capacity(query.len());
    let mut chars = query.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\'' {
            out.push(c);
            continue;
        }
        out.push('\'');
        let mut closed = false;
        while let Some(inner) = chars.next() {
            if inner == '\'' {
                if chars.peek() == Some(&'\'') {
                    chars.next();
                    out.push_str("  ");
                    continue;
                }
                out.push('\'');
                closed = true;
                break;
            }
            for _ in 0..inner.len_utf8() {
                out.push(' ');
            }
        }
        if !closed {
            return Err(unclassifiable("unterminated string literal"));
        }
    }
    Ok(out)
}

/// Constructs the scanner refuses to look inside of.
fn reject_unscannable(masked: &str) -> Result<(), PolicyViolation> {
    if masked.trim().is_empty() {
        return Err(unclassifiable("empty statement"));
    }
    if masked.contains("--") || masked.contains("/*") {
        return Err(unclassifiable("comments are not supported"));
    }
    let trimmed = masked.trim_end().trim_end_matches(';');
    if trimmed.contains(';') {
        return Err(unclassifiable("multiple statements are not supported"));
    }
    Ok(())
}

fn token_pattern() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| {
        Regex::new(r"[A-Za-z_][A-Za-z0-9_$#]*(?:\.(?:[A-Za-z0-9_$#]+|\*))*|[0-9]+(?:\.[0-9]+)?|\S")
            .unwrap_or_else(|e| panic!("token pattern: {e}"))
    })
}

fn tokenize(masked: &str) -> Vec<String> {
    token_pattern()
        .find_iter(masked)
        .map(|m| m.as_str().to_string())
        .collect()
}

const KEYWORDS: &[&str] = &[
    "select", "from", "where", "join", "inner", "left", "right", "full", "outer", "cross",
    "natural", "on", "using", "group", "by", "order", "limit", "offset", "having", "union",
    "all", "distinct", "as", "and", "or", "not", "in", "is", "null", "like", "between",
    "exists", "case", "when", "then", "else", "end", "insert", "into", "values", "update",
    "set", "delete", "returning", "asc", "desc", "top",
];

fn is_keyword(token: &str) -> bool {
    let lower = token.to_ascii_lowercase();
    KEYWORDS.contains(&lower.as_str())
}

fn is_identifier(token: &str) -> bool {
    token
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && !is_keyword(token)
        && !token.ends_with(".*")
}

/// Referenced tables plus the alias map used to attribute qualified columns.
struct TableRefs {
    tables: Vec<String>,
    /// lowercase alias or table name → canonical referenced name
    aliases: HashMap<String, String>,
}

impl TableRefs {
    fn push(&mut self, name: &str) {
        if !self
            .tables
            .iter()
            .any(|t| t.eq_ignore_ascii_case(name))
        {
            self.tables.push(name.to_string());
        }
        self.aliases
            .insert(name.to_ascii_lowercase(), name.to_string());
        if let Some(last) = name.rsplit('.').next() {
            self.aliases
                .entry(last.to_ascii_lowercase())
                .or_insert_with(|| name.to_string());
        }
    }

    fn alias(&mut self, alias: &str, table: &str) {
        self.aliases
            .insert(alias.to_ascii_lowercase(), table.to_string());
    }

    fn resolve(&self, qualifier: &str) -> Option<&str> {
        self.aliases
            .get(&qualifier.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Walk the token stream collecting every table referenced after
/// FROM/JOIN/INTO and as the UPDATE target. Subquery internals are covered
/// because their own FROM clauses appear in the same stream.
fn extract_table_refs(tokens: &[String]) -> Result<TableRefs, PolicyViolation> {
    let mut refs = TableRefs {
        tables: Vec::new(),
        aliases: HashMap::new(),
    };

    let mut i = 0;
    while i < tokens.len() {
        let lower = tokens[i].to_ascii_lowercase();
        match lower.as_str() {
            "from" | "join" => {
                if tokens.get(i + 1).map(String::as_str) == Some("(") {
                    // Derived table; its inner FROM is scanned on later
                    // iterations of this same walk.
                    i += 1;
                    continue;
                }
                i = consume_table(tokens, i + 1, &mut refs, lower == "from")?;
            }
            "into" => {
                i = consume_table(tokens, i + 1, &mut refs, false)?;
            }
            "update" if i == 0 => {
                i = consume_table(tokens, i + 1, &mut refs, false)?;
            }
            _ => i += 1,
        }
    }
    Ok(refs)
}

/// Consume one table name (with optional alias) starting at `start`,
/// following comma-separated lists when `list` is set. Returns the index to
/// resume scanning from.
fn consume_table(
    tokens: &[String],
    start: usize,
    refs: &mut TableRefs,
    list: bool,
) -> Result<usize, PolicyViolation> {
    let mut i = start;
    loop {
        let token = tokens
            .get(i)
            .ok_or_else(|| unclassifiable("expected a table name"))?;
        if !is_identifier(token) {
            return Err(unclassifiable(format!(
                "expected a table name, found '{token}'"
            )));
        }
        let table = token.clone();
        refs.push(&table);
        i += 1;

        // Optional alias: `AS name` or a bare identifier.
        if tokens.get(i).is_some_and(|t| t.eq_ignore_ascii_case("as")) {
            let alias = tokens
                .get(i + 1)
                .filter(|t| is_identifier(t))
                .ok_or_else(|| unclassifiable("expected an alias after AS"))?;
            refs.alias(alias, &table);
            i += 2;
        } else if tokens.get(i).is_some_and(|t| is_identifier(t)) {
            refs.alias(&tokens[i], &table);
            i += 1;
        }

        if list && tokens.get(i).map(String::as_str) == Some(",") {
            i += 1;
            continue;
        }
        return Ok(i);
    }
}

/// Which tables in this statement carry a column restriction.
fn restricted_tables<'a>(
    refs: &'a TableRefs,
    policy: &PolicyConfig,
) -> Vec<&'a str> {
    refs.tables
        .iter()
        .filter(|t| {
            policy
                .table_policy(t)
                .is_some_and(|p| !p.allows_all_columns())
        })
        .map(String::as_str)
        .collect()
}

/// Column-level enforcement for SELECT: every requested column must be
/// determinable and permitted. `SELECT *` (and anything else whose output
/// columns cannot be determined) is rejected against a restricted table
/// rather than silently projected.
fn check_select_columns(
    tokens: &[String],
    refs: &TableRefs,
    policy: &PolicyConfig,
) -> Result<(), PolicyViolation> {
    let restricted = restricted_tables(refs, policy);
    if restricted.is_empty() {
        return Ok(());
    }

    let items = select_list_items(tokens);
    for item in &items {
        check_select_item(item, refs, &restricted, policy)?;
    }
    Ok(())
}

/// Split the projection list (between the leading SELECT and the top-level
/// FROM) on top-level commas.
fn select_list_items(tokens: &[String]) -> Vec<Vec<String>> {
    let mut start = 1; // past SELECT
    while tokens
        .get(start)
        .is_some_and(|t| t.eq_ignore_ascii_case("distinct") || t.eq_ignore_ascii_case("all"))
    {
        start += 1;
    }

    let mut items = Vec::new();
    let mut current = Vec::new();
    let mut depth = 0i32;
    for token in &tokens[start.min(tokens.len())..] {
        match token.as_str() {
            "(" => depth += 1,
            ")" => depth -= 1,
            _ => {}
        }
        if depth == 0 {
            if token.eq_ignore_ascii_case("from") {
                break;
            }
            if token == "," {
                items.push(std::mem::take(&mut current));
                continue;
            }
        }
        current.push(token.clone());
    }
    if !current.is_empty() {
        items.push(current);
    }
    items
}

fn check_select_item(
    item: &[String],
    refs: &TableRefs,
    restricted: &[&str],
    policy: &PolicyConfig,
) -> Result<(), PolicyViolation> {
    // Bare `*`: output columns cannot be determined for any restricted table.
    if item.len() == 1 && item[0] == "*" {
        return Err(PolicyViolation::ColumnsIndeterminate {
            table: restricted[0].to_string(),
        });
    }

    // Qualified `alias.*`.
    if item.len() == 1 && item[0].ends_with(".*") {
        let qualifier = &item[0][..item[0].len() - 2];
        let table = refs
            .resolve(qualifier)
            .ok_or_else(|| unclassifiable(format!("unknown table qualifier '{qualifier}'")))?;
        if restricted.iter().any(|t| t.eq_ignore_ascii_case(table)) {
            return Err(PolicyViolation::ColumnsIndeterminate {
                table: table.to_string(),
            });
        }
        return Ok(());
    }

    let body = strip_alias(item);
    let mut idx = 0;
    while idx < body.len() {
        let token = &body[idx];
        if is_identifier(token) {
            // A name directly followed by '(' is a function, not a column.
            if body.get(idx + 1).map(String::as_str) == Some("(") {
                idx += 1;
                continue;
            }
            check_column_ref(token, refs, restricted, policy)?;
        }
        idx += 1;
    }
    Ok(())
}

/// Drop a trailing `AS alias` or bare alias from a projection item.
fn strip_alias(item: &[String]) -> &[String] {
    if item.len() >= 2 {
        let last = &item[item.len() - 1];
        let prev = &item[item.len() - 2];
        if prev.eq_ignore_ascii_case("as") && is_identifier(last) {
            return &item[..item.len() - 2];
        }
        let prev_is_operand = is_identifier(prev)
            || prev == ")"
            || prev.chars().next().is_some_and(|c| c.is_ascii_digit());
        if is_identifier(last) && !last.contains('.') && prev_is_operand {
            return &item[..item.len() - 1];
        }
    }
    item
}

/// Verify one column reference against the policy of the table it belongs
/// to. Unqualified references in a multi-table statement cannot be
/// attributed confidently, so any restricted table rejects them.
fn check_column_ref(
    token: &str,
    refs: &TableRefs,
    restricted: &[&str],
    policy: &PolicyConfig,
) -> Result<(), PolicyViolation> {
    if let Some((qualifier, column)) = token.rsplit_once('.') {
        let table = refs
            .resolve(qualifier)
            .ok_or_else(|| unclassifiable(format!("unknown table qualifier '{qualifier}'")))?
            .to_string();
        if let Some(table_policy) = policy.table_policy(&table) {
            if !table_policy.allows_column(column) {
                return Err(PolicyViolation::ColumnDenied {
                    table,
                    column: column.to_string(),
                });
            }
        }
        return Ok(());
    }

    if refs.tables.len() == 1 {
        let table = &refs.tables[0];
        if let Some(table_policy) = policy.table_policy(table) {
            if !table_policy.allows_column(token) {
                return Err(PolicyViolation::ColumnDenied {
                    table: table.clone(),
                    column: token.to_string(),
                });
            }
        }
        return Ok(());
    }

    // Multiple tables and at least one restricted: attribution is ambiguous.
    Err(PolicyViolation::ColumnsIndeterminate {
        table: restricted[0].to_string(),
    })
}

/// Column-level enforcement for UPDATE: the SET list names the assigned
/// columns directly.
fn check_update_columns(
    tokens: &[String],
    refs: &TableRefs,
    policy: &PolicyConfig,
) -> Result<(), PolicyViolation> {
    let table = refs
        .tables
        .first()
        .ok_or_else(|| unclassifiable("no table reference found"))?;
    let Some(table_policy) = policy.table_policy(table) else {
        return Ok(());
    };
    if table_policy.allows_all_columns() {
        return Ok(());
    }

    let set_idx = tokens
        .iter()
        .position(|t| t.eq_ignore_ascii_case("set"))
        .ok_or_else(|| unclassifiable("UPDATE without SET"))?;

    let mut expect_column = true;
    let mut depth = 0i32;
    for token in &tokens[set_idx + 1..] {
        match token.as_str() {
            "(" => depth += 1,
            ")" => depth -= 1,
            _ => {}
        }
        if depth == 0 && token.eq_ignore_ascii_case("where") {
            break;
        }
        if depth == 0 && token == "," {
            expect_column = true;
            continue;
        }
        if expect_column {
            if !is_identifier(token) {
                return Err(unclassifiable(format!(
                    "expected a column name in SET, found '{token}'"
                )));
            }
            let column = token.rsplit('.').next().unwrap_or(token);
            if !table_policy.allows_column(column) {
                return Err(PolicyViolation::ColumnDenied {
                    table: table.clone(),
                    column: column.to_string(),
                });
            }
            expect_column = false;
        }
    }
    Ok(())
}

/// Column-level enforcement for INSERT: the parenthesized column list names
/// the assigned columns; its absence means every column is assigned, which
/// a restricted table cannot verify.
fn check_insert_columns(
    tokens: &[String],
    refs: &TableRefs,
    policy: &PolicyConfig,
) -> Result<(), PolicyViolation> {
    let table = refs
        .tables
        .first()
        .ok_or_else(|| unclassifiable("no table reference found"))?;
    let Some(table_policy) = policy.table_policy(table) else {
        return Ok(());
    };
    if table_policy.allows_all_columns() {
        return Ok(());
    }

    let into_idx = tokens
        .iter()
        .position(|t| t.eq_ignore_ascii_case("into"))
        .ok_or_else(|| unclassifiable("INSERT without INTO"))?;

    // tokens: INTO <table> ( col [, col]* ) ...
    let after_table = into_idx + 2;
    if tokens.get(after_table).map(String::as_str) != Some("(") {
        return Err(PolicyViolation::ColumnsIndeterminate {
            table: table.clone(),
        });
    }

    for token in &tokens[after_table + 1..] {
        if token == ")" {
            break;
        }
        if token == "," {
            continue;
        }
        if !is_identifier(token) {
            return Err(unclassifiable(format!(
                "expected a column name in the INSERT list, found '{token}'"
            )));
        }
        if !table_policy.allows_column(token) {
            return Err(PolicyViolation::ColumnDenied {
                table: table.clone(),
                column: token.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tableward_core::{PolicyMode, TablePolicy};

    fn table(enabled: bool, operations: Vec<Operation>, columns: Vec<&str>) -> TablePolicy {
        TablePolicy {
            enabled,
            operations,
            columns: columns.into_iter().map(String::from).collect(),
            row_filter: None,
        }
    }

    fn whitelist(entries: Vec<(&str, TablePolicy)>) -> PolicyConfig {
        PolicyConfig {
            mode: PolicyMode::Whitelist,
            tables: entries
                .into_iter()
                .map(|(n, t)| (n.to_string(), t))
                .collect(),
        }
    }

    fn blacklist(entries: Vec<(&str, TablePolicy)>) -> PolicyConfig {
        PolicyConfig {
            mode: PolicyMode::Blacklist,
            tables: entries
                .into_iter()
                .map(|(n, t)| (n.to_string(), t))
                .collect(),
        }
    }

    fn orders_select_all() -> PolicyConfig {
        whitelist(vec![(
            "dbo.orders",
            table(true, vec![Operation::Select], vec!["*"]),
        )])
    }

    #[test]
    fn detects_operations() {
        assert_eq!(
            detect_operation("SELECT * FROM t").unwrap(),
            Operation::Select
        );
        assert_eq!(
            detect_operation("insert into t values (1)").unwrap(),
            Operation::Insert
        );
        assert_eq!(
            detect_operation("Update t set x = 1").unwrap(),
            Operation::Update
        );
        assert_eq!(
            detect_operation("DELETE FROM t").unwrap(),
            Operation::Delete
        );
    }

    #[test]
    fn cte_and_ddl_rejected() {
        assert!(matches!(
            detect_operation("WITH x AS (SELECT 1) SELECT * FROM x"),
            Err(PolicyViolation::Unclassifiable { .. })
        ));
        assert!(matches!(
            detect_operation("DROP TABLE dbo.orders"),
            Err(PolicyViolation::Unclassifiable { .. })
        ));
    }

    #[test]
    fn whitelist_allows_listed_table() {
        let policy = orders_select_all();
        let c = classify("SELECT * FROM dbo.orders", Operation::Select, &policy).unwrap();
        assert_eq!(c.tables, vec!["dbo.orders"]);
    }

    #[test]
    fn whitelist_rejects_unlisted_table() {
        let policy = orders_select_all();
        let err = classify("SELECT * FROM dbo.users", Operation::Select, &policy).unwrap_err();
        assert_eq!(
            err,
            PolicyViolation::TableDenied {
                table: "dbo.users".into()
            }
        );
    }

    #[test]
    fn whitelist_rejects_disabled_table() {
        let policy = whitelist(vec![(
            "dbo.orders",
            table(false, vec![Operation::Select], vec!["*"]),
        )]);
        assert!(matches!(
            classify("SELECT * FROM dbo.orders", Operation::Select, &policy),
            Err(PolicyViolation::TableDenied { .. })
        ));
    }

    #[test]
    fn operation_not_permitted_rejects_whole_statement() {
        let policy = orders_select_all();
        let err = classify("DELETE FROM dbo.orders", Operation::Delete, &policy).unwrap_err();
        assert_eq!(
            err,
            PolicyViolation::OperationDenied {
                table: "dbo.orders".into(),
                operation: Operation::Delete,
            }
        );
    }

    #[test]
    fn blacklist_disabled_rejected_unlisted_allowed() {
        let policy = blacklist(vec![("dbo.secrets", table(false, vec![], vec![]))]);
        assert!(matches!(
            classify("SELECT * FROM dbo.secrets", Operation::Select, &policy),
            Err(PolicyViolation::TableDenied { .. })
        ));
        let c = classify("SELECT * FROM dbo.customers", Operation::Select, &policy).unwrap();
        assert_eq!(c.tables, vec!["dbo.customers"]);
    }

    #[test]
    fn join_checks_every_table() {
        let policy = orders_select_all();
        let err = classify(
            "SELECT o.id FROM dbo.orders o JOIN dbo.users u ON u.id = o.user_id",
            Operation::Select,
            &policy,
        )
        .unwrap_err();
        assert_eq!(
            err,
            PolicyViolation::TableDenied {
                table: "dbo.users".into()
            }
        );
    }

    #[test]
    fn comma_list_from_checks_every_table() {
        let policy = orders_select_all();
        let err = classify(
            "SELECT o.id FROM dbo.orders o, dbo.users u WHERE u.id = o.user_id",
            Operation::Select,
            &policy,
        )
        .unwrap_err();
        assert_eq!(
            err,
            PolicyViolation::TableDenied {
                table: "dbo.users".into()
            }
        );
    }

    #[test]
    fn subquery_tables_are_classified() {
        let policy = orders_select_all();
        let err = classify(
            "SELECT id FROM dbo.orders WHERE user_id IN (SELECT id FROM dbo.users)",
            Operation::Select,
            &policy,
        )
        .unwrap_err();
        assert_eq!(
            err,
            PolicyViolation::TableDenied {
                table: "dbo.users".into()
            }
        );
    }

    #[test]
    fn select_star_on_column_restricted_table_rejected() {
        let policy = whitelist(vec![(
            "dbo.orders",
            table(true, vec![Operation::Select], vec!["id", "status"]),
        )]);
        assert!(matches!(
            classify("SELECT * FROM dbo.orders", Operation::Select, &policy),
            Err(PolicyViolation::ColumnsIndeterminate { .. })
        ));
    }

    #[test]
    fn restricted_columns_enforced() {
        let policy = whitelist(vec![(
            "dbo.orders",
            table(true, vec![Operation::Select], vec!["id", "status"]),
        )]);
        let c = classify(
            "SELECT id, status FROM dbo.orders",
            Operation::Select,
            &policy,
        )
        .unwrap();
        assert_eq!(c.tables, vec!["dbo.orders"]);

        let err = classify(
            "SELECT id, total FROM dbo.orders",
            Operation::Select,
            &policy,
        )
        .unwrap_err();
        assert_eq!(
            err,
            PolicyViolation::ColumnDenied {
                table: "dbo.orders".into(),
                column: "total".into(),
            }
        );
    }

    #[test]
    fn qualified_columns_resolve_through_aliases() {
        let policy = whitelist(vec![
            (
                "dbo.orders",
                table(true, vec![Operation::Select], vec!["id", "status"]),
            ),
            ("dbo.users", table(true, vec![Operation::Select], vec!["*"])),
        ]);
        let c = classify(
            "SELECT o.id, u.email FROM dbo.orders AS o JOIN dbo.users u ON u.id = o.id",
            Operation::Select,
            &policy,
        )
        .unwrap();
        assert_eq!(c.tables.len(), 2);

        let err = classify(
            "SELECT o.total FROM dbo.orders o JOIN dbo.users u ON u.id = o.id",
            Operation::Select,
            &policy,
        )
        .unwrap_err();
        assert!(matches!(err, PolicyViolation::ColumnDenied { .. }));
    }

    #[test]
    fn unqualified_column_in_join_fails_closed() {
        let policy = whitelist(vec![
            (
                "dbo.orders",
                table(true, vec![Operation::Select], vec!["id"]),
            ),
            ("dbo.users", table(true, vec![Operation::Select], vec!["*"])),
        ]);
        let err = classify(
            "SELECT email FROM dbo.orders o JOIN dbo.users u ON u.id = o.id",
            Operation::Select,
            &policy,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            PolicyViolation::ColumnsIndeterminate { .. }
        ));
    }

    #[test]
    fn function_calls_check_argument_columns() {
        let policy = whitelist(vec![(
            "dbo.orders",
            table(true, vec![Operation::Select], vec!["id", "total"]),
        )]);
        // count(*) requests no column
        classify(
            "SELECT count(*) FROM dbo.orders",
            Operation::Select,
            &policy,
        )
        .unwrap();
        // sum(total) requests `total`, which is allowed
        classify(
            "SELECT sum(total) AS revenue FROM dbo.orders",
            Operation::Select,
            &policy,
        )
        .unwrap();
        // sum(discount) requests a forbidden column
        let err = classify(
            "SELECT sum(discount) FROM dbo.orders",
            Operation::Select,
            &policy,
        )
        .unwrap_err();
        assert!(matches!(err, PolicyViolation::ColumnDenied { .. }));
    }

    #[test]
    fn update_set_columns_enforced() {
        let policy = whitelist(vec![(
            "dbo.orders",
            table(true, vec![Operation::Update], vec!["status"]),
        )]);
        classify(
            "UPDATE dbo.orders SET status = 'shipped' WHERE id = 7",
            Operation::Update,
            &policy,
        )
        .unwrap();

        let err = classify(
            "UPDATE dbo.orders SET total = 0 WHERE id = 7",
            Operation::Update,
            &policy,
        )
        .unwrap_err();
        assert_eq!(
            err,
            PolicyViolation::ColumnDenied {
                table: "dbo.orders".into(),
                column: "total".into(),
            }
        );
    }

    #[test]
    fn insert_column_list_enforced() {
        let policy = whitelist(vec![(
            "dbo.orders",
            table(true, vec![Operation::Insert], vec!["id", "status"]),
        )]);
        classify(
            "INSERT INTO dbo.orders (id, status) VALUES (1, 'new')",
            Operation::Insert,
            &policy,
        )
        .unwrap();

        let err = classify(
            "INSERT INTO dbo.orders (id, total) VALUES (1, 9.5)",
            Operation::Insert,
            &policy,
        )
        .unwrap_err();
        assert!(matches!(err, PolicyViolation::ColumnDenied { .. }));
    }

    #[test]
    fn insert_without_column_list_on_restricted_table_rejected() {
        let policy = whitelist(vec![(
            "dbo.orders",
            table(true, vec![Operation::Insert], vec!["id", "status"]),
        )]);
        let err = classify(
            "INSERT INTO dbo.orders VALUES (1, 'new')",
            Operation::Insert,
            &policy,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            PolicyViolation::ColumnsIndeterminate { .. }
        ));
    }

    #[test]
    fn literals_never_scanned_as_references() {
        let policy = orders_select_all();
        // The literal mentions another table; only dbo.orders is referenced.
        let c = classify(
            "SELECT * FROM dbo.orders WHERE note = 'moved from dbo.users'",
            Operation::Select,
            &policy,
        )
        .unwrap();
        assert_eq!(c.tables, vec!["dbo.orders"]);
    }

    #[test]
    fn comments_and_batches_rejected() {
        let policy = orders_select_all();
        assert!(matches!(
            classify(
                "SELECT * FROM dbo.orders -- sneak",
                Operation::Select,
                &policy
            ),
            Err(PolicyViolation::Unclassifiable { .. })
        ));
        assert!(matches!(
            classify(
                "SELECT * FROM dbo.orders; DELETE FROM dbo.orders",
                Operation::Select,
                &policy
            ),
            Err(PolicyViolation::Unclassifiable { .. })
        ));
        assert!(matches!(
            classify(
                "SELECT * FROM dbo.orders /* hmm */",
                Operation::Select,
                &policy
            ),
            Err(PolicyViolation::Unclassifiable { .. })
        ));
    }

    #[test]
    fn trailing_semicolon_accepted() {
        let policy = orders_select_all();
        classify("SELECT * FROM dbo.orders;", Operation::Select, &policy).unwrap();
    }

    #[test]
    fn unterminated_literal_rejected() {
        let policy = orders_select_all();
        assert!(matches!(
            classify(
                "SELECT * FROM dbo.orders WHERE note = 'open",
                Operation::Select,
                &policy
            ),
            Err(PolicyViolation::Unclassifiable { .. })
        ));
    }

    #[test]
    fn declared_operation_must_match_statement() {
        let policy = orders_select_all();
        assert!(matches!(
            classify("DELETE FROM dbo.orders", Operation::Select, &policy),
            Err(PolicyViolation::Unclassifiable { .. })
        ));
    }

    #[test]
    fn tableless_select_touches_nothing() {
        let policy = whitelist(vec![]);
        let c = classify("SELECT 1 + 1", Operation::Select, &policy).unwrap();
        assert!(c.tables.is_empty());
    }

    #[test]
    fn table_names_case_insensitive_against_policy() {
        let policy = orders_select_all();
        classify("SELECT * FROM DBO.ORDERS", Operation::Select, &policy).unwrap();
    }

    #[test]
    fn classification_is_pure() {
        let policy = orders_select_all();
        let a = classify("SELECT * FROM dbo.orders", Operation::Select, &policy).unwrap();
        let b = classify("SELECT * FROM dbo.orders", Operation::Select, &policy).unwrap();
        assert_eq!(a, b);
    }
}
