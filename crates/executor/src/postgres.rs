//! PostgreSQL executor backed by a sqlx connection pool.
//!
//! The production backend for customer-hosted databases. Connection
//! parameters come from an explicit `DatabaseConfig`; nothing is read from
//! the ambient environment at call time.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{Column, PgPool, Row as SqlxRow, TypeInfo};
use std::time::{Duration, Instant};
use tableward_config::DatabaseConfig;
use tableward_core::{ExecutionError, Operation, Row};
use tracing::{debug, info, warn};

use crate::{QueryExecutor, RawQueryOutput};

pub struct PostgresExecutor {
    pool: PgPool,
    database: String,
    timeout: Duration,
}

impl PostgresExecutor {
    /// Connect using an explicit configuration.
    pub async fn new(config: &DatabaseConfig) -> Result<Self, ExecutionError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.query_timeout_secs))
            .connect(&config.connection_url())
            .await
            .map_err(|e| ExecutionError::Connection {
                message: e.to_string(),
            })?;

        info!(database = %config.database, host = %config.host, "Postgres executor connected");
        Ok(Self {
            pool,
            database: config.database.clone(),
            timeout: Duration::from_secs(config.query_timeout_secs),
        })
    }

    /// Wrap an existing pool (useful for testing against seeded databases).
    pub fn from_pool(pool: PgPool, database: impl Into<String>, timeout: Duration) -> Self {
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
impl QueryExecutor for PostgresExecutor {
    fn name(&self) -> &str {
        "postgres"
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

/// Decode one Postgres row into a JSON map, using the column's reported type.
fn row_to_json(row: &PgRow) -> Result<Row, ExecutionError> {
    let mut map = Row::new();
    for (i, column) in row.columns().iter().enumerate() {
        let value = decode_value(row, i, column.type_info().name())?;
        map.insert(column.name().to_string(), value);
    }
    Ok(map)
}

fn decode_value(row: &PgRow, index: usize, type_name: &str) -> Result<Value, ExecutionError> {
    let value = match type_name {
        "BOOL" => row
            .try_get::<Option<bool>, _>(index)
            .map_err(driver_error)?
            .map(Value::from)
            .unwrap_or(Value::Null),
        "INT2" => row
            .try_get::<Option<i16>, _>(index)
            .map_err(driver_error)?
            .map(|v| Value::from(v as i64))
            .unwrap_or(Value::Null),
        "INT4" => row
            .try_get::<Option<i32>, _>(index)
            .map_err(driver_error)?
            .map(|v| Value::from(v as i64))
            .unwrap_or(Value::Null),
        "INT8" => row
            .try_get::<Option<i64>, _>(index)
            .map_err(driver_error)?
            .map(Value::from)
            .unwrap_or(Value::Null),
        "FLOAT4" => row
            .try_get::<Option<f32>, _>(index)
            .map_err(driver_error)?
            .map(|v| Value::from(v as f64))
            .unwrap_or(Value::Null),
        "FLOAT8" => row
            .try_get::<Option<f64>, _>(index)
            .map_err(driver_error)?
            .map(Value::from)
            .unwrap_or(Value::Null),
        "TEXT" | "VARCHAR" | "BPCHAR" | "CHAR" | "NAME" => row
            .try_get::<Option<String>, _>(index)
            .map_err(driver_error)?
            .map(Value::String)
            .unwrap_or(Value::Null),
        "UUID" => row
            .try_get::<Option<sqlx::types::Uuid>, _>(index)
            .map_err(driver_error)?
            .map(|u| Value::String(u.to_string()))
            .unwrap_or(Value::Null),
        "TIMESTAMP" => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(index)
            .map_err(driver_error)?
            .map(|t| Value::String(t.to_string()))
            .unwrap_or(Value::Null),
        "TIMESTAMPTZ" => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(index)
            .map_err(driver_error)?
            .map(|t| Value::String(t.to_rfc3339()))
            .unwrap_or(Value::Null),
        "DATE" => row
            .try_get::<Option<chrono::NaiveDate>, _>(index)
            .map_err(driver_error)?
            .map(|d| Value::String(d.to_string()))
            .unwrap_or(Value::Null),
        "JSON" | "JSONB" => row
            .try_get::<Option<Value>, _>(index)
            .map_err(driver_error)?
            .unwrap_or(Value::Null),
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
