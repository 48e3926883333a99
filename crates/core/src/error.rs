//! Error types for the Tableward domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant. Display strings for
//! `PolicyViolation` are part of the tool contract: they are shown to the
//! calling model verbatim, so they name the offending table and rule but
//! never internal state.

use thiserror::Error;

use crate::policy::Operation;

/// The top-level error type for all Tableward operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Policy decisions ---
    #[error("Policy violation: {0}")]
    Policy(#[from] PolicyViolation),

    // --- Agent configuration ---
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    // --- Database execution ---
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    // --- Result shaping ---
    #[error("Shaping error: {0}")]
    Shaping(#[from] ShapingError),

    // --- Tool boundary ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// A statement was rejected by the policy before touching the database.
///
/// Always recoverable by the caller: a different, compliant statement may
/// succeed. Never retried automatically.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyViolation {
    #[error("table '{table}' is not accessible under the current policy")]
    TableDenied { table: String },

    #[error("operation {operation} is not permitted on table '{table}'")]
    OperationDenied { table: String, operation: Operation },

    #[error("column '{column}' is not permitted on table '{table}'")]
    ColumnDenied { table: String, column: String },

    #[error(
        "cannot verify column access on '{table}': the requested columns could not be determined"
    )]
    ColumnsIndeterminate { table: String },

    #[error("row filtering cannot be enforced for this statement on table '{table}'")]
    FilterUnenforceable { table: String },

    #[error("statement could not be classified: {reason}")]
    Unclassifiable { reason: String },
}

impl PolicyViolation {
    /// The table this violation concerns, when one could be identified.
    pub fn table(&self) -> Option<&str> {
        match self {
            Self::TableDenied { table }
            | Self::OperationDenied { table, .. }
            | Self::ColumnDenied { table, .. }
            | Self::ColumnsIndeterminate { table }
            | Self::FilterUnenforceable { table } => Some(table),
            Self::Unclassifiable { .. } => None,
        }
    }
}

/// The agent's configuration is broken in a way an administrator must fix.
///
/// Fatal for that agent's query tool until the configuration is corrected;
/// never silently swallowed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("row filter for '{table}' references '{{{placeholder}}}' but no binding exists")]
    UnboundPlaceholder { table: String, placeholder: String },

    #[error("malformed policy: {0}")]
    MalformedPolicy(String),
}

/// The database engine failed to run the validated statement.
///
/// Surfaced to the caller as a failure result; not retried by this core.
#[derive(Debug, Clone, Error)]
pub enum ExecutionError {
    #[error("query timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("database error: {message}")]
    Driver { message: String },

    #[error("could not connect to database: {message}")]
    Connection { message: String },
}

/// The shaper detected an internal invariant breach.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapingError {
    #[error("returned count {returned} exceeds total count {total}")]
    CountMismatch { returned: usize, total: usize },
}

/// Failures at the tool boundary itself (argument parsing, registry lookup).
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool execution failed: {tool_name} — {reason}")]
    ExecutionFailed { tool_name: String, reason: String },
}
