//! In-memory executor — fixture rows for tests and dry runs.
//!
//! Returns the configured rows for any statement. Lets the pipeline
//! (classify → filter → execute → shape) be exercised without a database.

use async_trait::async_trait;
use std::time::Instant;
use tableward_core::{ExecutionError, Operation, Row};

use crate::{QueryExecutor, RawQueryOutput};

/// Fixture-backed executor.
pub struct InMemoryExecutor {
    database: String,
    columns: Vec<String>,
    rows: Vec<Row>,
    fail_with: Option<ExecutionError>,
}

impl InMemoryExecutor {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            columns: Vec::new(),
            rows: Vec::new(),
            fail_with: None,
        }
    }

    /// Set the rows every read returns. Column order comes from `columns`.
    pub fn with_rows(mut self, columns: Vec<String>, rows: Vec<Row>) -> Self {
        self.columns = columns;
        self.rows = rows;
        self
    }

    /// Make every execution fail, for exercising the failure path.
    pub fn failing(mut self, error: ExecutionError) -> Self {
        self.fail_with = Some(error);
        self
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

#[async_trait]
impl QueryExecutor for InMemoryExecutor {
    fn name(&self) -> &str {
        "in_memory"
    }

    fn database(&self) -> &str {
        &self.database
    }

    async fn execute(
        &self,
        _statement: &str,
        operation: Operation,
    ) -> Result<RawQueryOutput, ExecutionError> {
        if let Some(error) = &self.fail_with {
            return Err(error.clone());
        }

        let started = Instant::now();
        let output = if operation.is_write() {
            RawQueryOutput {
                columns: Vec::new(),
                rows: Vec::new(),
                total_count: self.rows.len(),
                execution_time_ms: started.elapsed().as_millis() as u64,
            }
        } else {
            RawQueryOutput {
                columns: self.columns.clone(),
                rows: self.rows.clone(),
                total_count: self.rows.len(),
                execution_time_ms: started.elapsed().as_millis() as u64,
            }
        };
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_rows(n: usize) -> (Vec<String>, Vec<Row>) {
        let columns = vec!["id".to_string()];
        let rows = (0..n)
            .map(|i| {
                let mut row = Row::new();
                row.insert("id".into(), json!(i as i64));
                row
            })
            .collect();
        (columns, rows)
    }

    #[tokio::test]
    async fn returns_fixture_rows() {
        let (columns, rows) = make_rows(3);
        let executor = InMemoryExecutor::new("fixture").with_rows(columns, rows);
        let output = executor
            .execute("SELECT id FROM t", Operation::Select)
            .await
            .unwrap();
        assert_eq!(output.total_count, 3);
        assert_eq!(output.rows.len(), 3);
        assert_eq!(output.columns, vec!["id"]);
    }

    #[tokio::test]
    async fn failing_mode_surfaces_error() {
        let executor = InMemoryExecutor::new("fixture").failing(ExecutionError::Timeout {
            timeout_secs: 30,
        });
        let err = executor
            .execute("SELECT 1", Operation::Select)
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::Timeout { .. }));
    }

    #[tokio::test]
    async fn writes_return_no_rows() {
        let (columns, rows) = make_rows(4);
        let executor = InMemoryExecutor::new("fixture").with_rows(columns, rows);
        let output = executor
            .execute("DELETE FROM t", Operation::Delete)
            .await
            .unwrap();
        assert!(output.rows.is_empty());
        assert_eq!(output.total_count, 4);
    }
}
