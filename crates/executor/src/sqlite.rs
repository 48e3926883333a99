//! SQLite executor backed by a sqlx connection pool.
//!
//! Used for embedded targets and throughout the test suite (via
//! `sqlite::memory:`). Statements run under the configured timeout; a
//! statement that exceeds it is aborted and the connection goes back to the
//! pool when the cancelled future is dropped.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row as SqlxRow, SqlitePool, TypeInfo};
use std::str::FromStr;
use std::time::{Duration, Instant};
use tableward_config::DatabaseConfig;
use tableward_core::{ExecutionError, Operation, Row};
use tracing::{debug, info, warn};

use crate::{QueryExecutor, RawQueryOutput};

pub struct SqliteExecutor {
    pool: SqlitePool,
    database: String,
    timeout: Duration,
}

impl SqliteExecutor {
    /// Connect using an explicit configuration.
    pub async fn new(config: &DatabaseConfig) -> Result<Self, ExecutionError> {
        let options = SqliteConnectOptions::from_str(&config.connection_url())
            .map_err(|e| ExecutionError::Connection {
                message: format!("invalid SQLite path: {e}"),
            })?
            .create_if_missing(false)
            .read_only(false);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| ExecutionError::Connection {
                message: e.to_string(),
            })?;

        info!(database = %config.database, "SQLite executor connected");
        Ok(Self {
            pool,
            database: config.database.clone(),
            timeout: Duration::from_secs(config.query_timeout_secs),
        })
    }

    /// Wrap an existing pool (useful for testing against seeded databases).
    pub fn from_pool(pool: SqlitePool, database: impl Into<String>, timeout: Duration) -> Self {
        Self {
            pool,
            database: database.into(),
            timeout,
        }
    }

    fn timeout_error(&self) -> ExecutionError {
        ExecutionError::Timeout {
            timeout_secs: self.timeout.as_secs(),
        }
    }
}

#[async_trait]
impl QueryExecutor for SqliteExecutor {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn database(&self) -> &str {
        &self.database
    }

    async fn execute(
        &self,
        statement: &str,
        operation: Operation,
    ) -> Result<RawQueryOutput, ExecutionError> {
        let started = Instant::now();

        if operation.is_write() {
            let result = tokio::time::timeout(
                self.timeout,
                sqlx::query(statement).execute(&self.pool),
            )
            .await
            .map_err(|_| self.timeout_error())?
            .map_err(driver_error)?;

            let elapsed = started.elapsed().as_millis() as u64;
            debug!(affected = result.rows_affected(), elapsed_ms = elapsed, "Write executed");
            return Ok(RawQueryOutput {
                columns: Vec::new(),
                rows: Vec::new(),
                total_count: result.rows_affected() as usize,
                execution_time_ms: elapsed,
            });
        }

        let raw_rows = tokio::time::timeout(
            self.timeout,
            sqlx::query(statement).fetch_all(&self.pool),
        )
        .await
        .map_err(|_| self.timeout_error())?
        .map_err(driver_error)?;

        let columns: Vec<String> = raw_rows
            .first()
            .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();

        let rows: Vec<Row> = raw_rows
            .iter()
            .map(row_to_json)
            .collect::<Result<_, _>>()?;

        let elapsed = started.elapsed().as_millis() as u64;
        debug!(rows = rows.len(), elapsed_ms = elapsed, "Read executed");
        Ok(RawQueryOutput {
            columns,
            total_count: rows.len(),
            rows,
            execution_time_ms: elapsed,
        })
    }
}

fn driver_error(e: sqlx::Error) -> ExecutionError {
    ExecutionError::Driver {
        message: e.to_string(),
    }
}

/// Decode one SQLite row into a JSON map, using the column's reported type.
fn row_to_json(row: &SqliteRow) -> Result<Row, ExecutionError> {
    let mut map = Row::new();
    for (i, column) in row.columns().iter().enumerate() {
        let value = decode_value(row, i, column.type_info().name())?;
        map.insert(column.name().to_string(), value);
    }
    Ok(map)
}

fn decode_value(row: &SqliteRow, index: usize, type_name: &str) -> Result<Value, ExecutionError> {
    let value = match type_name {
        "NULL" => Value::Null,
        "INTEGER" | "INT" | "INT4" | "INT8" | "BIGINT" => row
            .try_get::<Option<i64>, _>(index)
            .map_err(driver_error)?
            .map(Value::from)
            .unwrap_or(Value::Null),
        "REAL" | "FLOAT" | "DOUBLE" | "NUMERIC" => row
            .try_get::<Option<f64>, _>(index)
            .map_err(driver_error)?
            .map(Value::from)
            .unwrap_or(Value::Null),
        "BOOLEAN" | "BOOL" => row
            .try_get::<Option<bool>, _>(index)
            .map_err(driver_error)?
            .map(Value::from)
            .unwrap_or(Value::Null),
        "BLOB" => {
            // Binary payloads are not meaningful to the model; report size.
            match row.try_get::<Option<Vec<u8>>, _>(index).map_err(driver_error)? {
                Some(bytes) => Value::String(format!("<{} bytes>", bytes.len())),
                None => Value::Null,
            }
        }
        _ => match row.try_get::<Option<String>, _>(index) {
            Ok(Some(s)) => Value::String(s),
            Ok(None) => Value::Null,
            Err(e) => {
                warn!(type_name, error = %e, "Undecodable column value");
                Value::Null
            }
        },
    };
    Ok(value)
}
