//! The policy model — per-agent table access rules.
//!
//! A `PolicyConfig` is created and updated by an administrative action
//! outside this core and lives for the agent's lifetime. It is persisted as
//! JSON in the agent's settings, so the serde shape here *is* the external
//! contract. Unknown fields are rejected at load time rather than carried
//! along silently.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::ConfigurationError;

/// How the table map is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyMode {
    /// Only tables explicitly listed and enabled are reachable.
    Whitelist,
    /// Every table is reachable unless explicitly listed and disabled.
    /// Absence of an entry means "not yet classified", not "forbidden".
    Blacklist,
}

/// A statement operation class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Select,
    Insert,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Select => "SELECT",
            Operation::Insert => "INSERT",
            Operation::Update => "UPDATE",
            Operation::Delete => "DELETE",
        }
    }

    /// Whether this operation assigns values to columns.
    pub fn is_write(&self) -> bool {
        !matches!(self, Operation::Select)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The column sentinel meaning "all columns".
pub const ALL_COLUMNS: &str = "*";

/// Per-table access rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct TablePolicy {
    pub enabled: bool,

    /// Operations permitted on this table. Empty = none.
    #[serde(default)]
    pub operations: Vec<Operation>,

    /// Permitted columns, or `["*"]` for all. For SELECT this restricts
    /// which columns may be returned; for writes, which may be assigned.
    /// An empty list permits no columns.
    #[serde(default = "default_columns")]
    pub columns: Vec<String>,

    /// Optional predicate template with `{name}` placeholders, bound from
    /// system-known context at request time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_filter: Option<String>,
}

fn default_columns() -> Vec<String> {
    vec![ALL_COLUMNS.to_string()]
}

impl TablePolicy {
    pub fn allows_operation(&self, operation: Operation) -> bool {
        self.operations.contains(&operation)
    }

    /// True when the policy places no column restriction on this table.
    pub fn allows_all_columns(&self) -> bool {
        self.columns.len() == 1 && self.columns[0] == ALL_COLUMNS
    }

    pub fn allows_column(&self, column: &str) -> bool {
        self.allows_all_columns()
            || self
                .columns
                .iter()
                .any(|c| c.eq_ignore_ascii_case(column))
    }

    /// Whether a non-empty row filter is configured.
    pub fn has_row_filter(&self) -> bool {
        self.row_filter
            .as_deref()
            .is_some_and(|f| !f.trim().is_empty())
    }
}

/// The complete per-agent policy: mode plus the table map.
///
/// Table keys are fully-qualified `schema.table` names. Lookups are
/// case-insensitive, matching engine behavior for unquoted identifiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyConfig {
    pub mode: PolicyMode,

    #[serde(default)]
    pub tables: HashMap<String, TablePolicy>,
}

impl PolicyConfig {
    /// Parse and validate a policy JSON document.
    pub fn from_json(json: &str) -> Result<Self, ConfigurationError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ConfigurationError::MalformedPolicy(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject malformed shapes before they reach the classifier.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        for (name, table) in &self.tables {
            if name.trim().is_empty() || name.chars().any(char::is_whitespace) {
                return Err(ConfigurationError::MalformedPolicy(format!(
                    "invalid table name '{name}'"
                )));
            }
            if table.columns.iter().any(|c| c == ALL_COLUMNS) && table.columns.len() != 1 {
                return Err(ConfigurationError::MalformedPolicy(format!(
                    "table '{name}' mixes '*' with named columns"
                )));
            }
            if table.columns.iter().any(|c| c.trim().is_empty()) {
                return Err(ConfigurationError::MalformedPolicy(format!(
                    "table '{name}' contains an empty column name"
                )));
            }
            if let Some(filter) = &table.row_filter {
                validate_template(name, filter)?;
            }
        }
        Ok(())
    }

    /// Case-insensitive table lookup.
    pub fn table_policy(&self, table: &str) -> Option<&TablePolicy> {
        self.tables
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(table))
            .map(|(_, policy)| policy)
    }

    /// Whether a table is reachable at all under the active mode. Operation
    /// and column rules are checked separately by the classifier.
    pub fn is_reachable(&self, table: &str) -> bool {
        match (self.mode, self.table_policy(table)) {
            (PolicyMode::Whitelist, Some(policy)) => policy.enabled,
            (PolicyMode::Whitelist, None) => false,
            (PolicyMode::Blacklist, Some(policy)) => policy.enabled,
            (PolicyMode::Blacklist, None) => true,
        }
    }

    /// Tables explicitly listed and enabled, sorted by name. Under blacklist
    /// mode this is not exhaustive (unlisted tables are also reachable).
    pub fn listed_tables(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .tables
            .iter()
            .filter(|(_, t)| t.enabled)
            .map(|(n, _)| n.clone())
            .collect();
        names.sort();
        names
    }
}

/// Check that every `{` opens a well-formed `{name}` placeholder.
fn validate_template(table: &str, template: &str) -> Result<(), ConfigurationError> {
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else {
            return Err(ConfigurationError::MalformedPolicy(format!(
                "row filter for '{table}' has an unclosed placeholder"
            )));
        };
        let name = &after[..end];
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(ConfigurationError::MalformedPolicy(format!(
                "row filter for '{table}' has an invalid placeholder name '{name}'"
            )));
        }
        rest = &after[end + 1..];
    }
    if rest.contains('}') || template.matches('}').count() != template.matches('{').count() {
        return Err(ConfigurationError::MalformedPolicy(format!(
            "row filter for '{table}' has unbalanced braces"
        )));
    }
    Ok(())
}
