//! Query execution and result shaping for Tableward.
//!
//! The `QueryExecutor` trait is the boundary to the external database
//! collaborator: it runs a validated, filter-augmented statement and returns
//! raw rows plus the full match count and timing. Implementations run under
//! a fixed timeout and abort long-running statements deterministically,
//! returning the connection to the pool.
//!
//! The `shape` module turns raw executor output into the bounded, described
//! payload the agent sees.

pub mod in_memory;
pub mod shape;

#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

use async_trait::async_trait;
use tableward_core::{ExecutionError, Operation, Row};

pub use in_memory::InMemoryExecutor;
#[cfg(feature = "postgres")]
pub use postgres::PostgresExecutor;
pub use shape::{Shaped, effective_limit, infer_schema, shape};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteExecutor;

/// Raw output of one executed statement, before shaping.
#[derive(Debug, Clone, PartialEq)]
pub struct RawQueryOutput {
    /// Column names in result order (empty for writes).
    pub columns: Vec<String>,

    /// Every matching row; the shaper truncates, never the executor.
    pub rows: Vec<Row>,

    /// Full match count for reads, affected-row count for writes. Computed
    /// before any truncation so it can never diverge from `rows`.
    pub total_count: usize,

    pub execution_time_ms: u64,
}

/// Boundary to the configured database engine.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Backend name (e.g. "sqlite", "postgres").
    fn name(&self) -> &str;

    /// Identifier of the target database, echoed in results.
    fn database(&self) -> &str;

    /// Run one statement. The statement has already passed classification
    /// and filter augmentation; this only talks to the engine.
    async fn execute(
        &self,
        statement: &str,
        operation: Operation,
    ) -> Result<RawQueryOutput, ExecutionError>;
}
