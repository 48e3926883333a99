//! Database query tool — the boundary the agent calls through.
//!
//! Translates one `{query, purpose, limit}` request into the structured
//! success/failure contract. A request moves linearly through
//! classify → filter → execute → shape; classification rejects before the
//! database is ever touched, and no error crosses this boundary
//! unstructured — the model always receives a JSON payload with `success`
//! set.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tableward_core::{Error, QueryRequest, QueryResult, Tool, ToolError, ToolResult};
use tableward_executor::{QueryExecutor, shape};
use tableward_policy::{
    AuditEvent, AuditLogger, AuditOutcome, FilterContext, PolicyStore, augment_statement,
    classify, compile_filters, detect_operation,
};
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Policy-mediated query access to the agent's configured database.
pub struct DatabaseQueryTool {
    agent_id: String,
    store: Arc<PolicyStore>,
    executor: Arc<dyn QueryExecutor>,
    context: FilterContext,
    audit: Arc<AuditLogger>,
}

impl DatabaseQueryTool {
    pub fn new(
        agent_id: impl Into<String>,
        store: Arc<PolicyStore>,
        executor: Arc<dyn QueryExecutor>,
        context: FilterContext,
        audit: Arc<AuditLogger>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            store,
            executor,
            context,
            audit,
        }
    }

    /// Run the full mediation pipeline for one request.
    async fn run(&self, request: &QueryRequest) -> Result<QueryResult, Error> {
        let policy = self
            .store
            .snapshot(&request.agent_id)
            .ok_or_else(|| {
                tableward_core::ConfigurationError::MalformedPolicy(format!(
                    "no policy installed for agent '{}'",
                    request.agent_id
                ))
            })?;

        let operation = detect_operation(&request.query)?;
        let classification = classify(&request.query, operation, &policy)?;
        let filters = compile_filters(&classification.tables, &policy, &self.context)?;
        let statement =
            augment_statement(&request.query, operation, &classification.tables, &filters)?;

        let raw = self.executor.execute(&statement, operation).await?;

        let shaped = match shape(&raw.columns, raw.rows, raw.total_count, request.limit) {
            Ok(shaped) => shaped,
            Err(e) => {
                // Invariant breach: degrade to a safe empty response rather
                // than inconsistent counts.
                error!(error = %e, "Result shaping invariant breach");
                tableward_executor::Shaped {
                    results: Vec::new(),
                    schema: Vec::new(),
                    total_count: 0,
                    returned_count: 0,
                    limited: true,
                }
            }
        };

        self.audit.log(
            AuditEvent::QueryExecuted { operation },
            &request.agent_id,
            self.executor.database(),
            AuditOutcome::Success,
            Some(request.purpose.clone()),
        );

        Ok(QueryResult {
            database: self.executor.database().to_string(),
            query: request.query.clone(),
            results: shaped.results,
            total_count: shaped.total_count,
            returned_count: shaped.returned_count,
            schema: shaped.schema,
            execution_time_ms: raw.execution_time_ms,
            limited: shaped.limited,
        })
    }

    /// Strip compiled filter bindings out of a message before it reaches
    /// the model. Driver errors may echo statement text, and the augmented
    /// statement contains resolved context values.
    fn sanitize(&self, message: &str) -> String {
        let mut sanitized = message.to_string();
        for value in self.context.values() {
            if !value.is_empty() {
                sanitized = sanitized.replace(value, "[redacted]");
            }
        }
        sanitized
    }

    fn audit_failure(&self, error: &Error, query: &str) {
        match error {
            Error::Policy(violation) => {
                self.audit.log(
                    AuditEvent::QueryRejected {
                        rule: violation.to_string(),
                    },
                    &self.agent_id,
                    violation.table().unwrap_or(self.executor.database()),
                    AuditOutcome::Denied,
                    Some(query.to_string()),
                );
            }
            Error::Configuration(_) => {
                self.audit.log(
                    AuditEvent::ConfigurationRejected,
                    &self.agent_id,
                    self.executor.database(),
                    AuditOutcome::Failure,
                    None,
                );
            }
            _ => {
                let operation = detect_operation(query).unwrap_or(tableward_core::Operation::Select);
                self.audit.log(
                    AuditEvent::QueryFailed { operation },
                    &self.agent_id,
                    self.executor.database(),
                    AuditOutcome::Failure,
                    None,
                );
            }
        }
    }

    /// The caller-safe failure message for an error.
    fn failure_message(&self, error: &Error) -> String {
        match error {
            // Policy violation text is written for the model: table + rule.
            Error::Policy(violation) => violation.to_string(),
            Error::Configuration(e) => {
                // Administrator-fixable; the model only needs to know the
                // tool is unavailable.
                warn!(error = %e, "Agent configuration rejected");
                format!("the query tool is misconfigured for this agent: {e}")
            }
            Error::Execution(e) => self.sanitize(&e.to_string()),
            other => self.sanitize(&other.to_string()),
        }
    }
}

#[async_trait]
impl Tool for DatabaseQueryTool {
    fn name(&self) -> &str {
        "database_query"
    }

    fn description(&self) -> &str {
        "Run a SQL query against the connected database. Only tables and columns permitted by \
         the access policy are reachable. Results are capped at `limit` rows (default 10); \
         `totalCount` reports the full match count and `limited` signals truncation."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The SQL statement to run"
                },
                "purpose": {
                    "type": "string",
                    "description": "Why this query is needed (recorded in the audit log)"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum rows to return; -1 for all rows (default 10)"
                }
            },
            "required": ["query", "purpose"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let query = arguments["query"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?
            .to_string();
        let purpose = arguments["purpose"].as_str().unwrap_or("").to_string();
        let limit = arguments["limit"].as_i64();

        let request = QueryRequest {
            agent_id: self.agent_id.clone(),
            query,
            purpose,
            limit,
        };

        let request_id = Uuid::new_v4();
        debug!(%request_id, agent_id = %request.agent_id, "Query request received");

        let payload = match self.run(&request).await {
            Ok(result) => {
                let mut value = serde_json::to_value(&result).map_err(|e| {
                    ToolError::ExecutionFailed {
                        tool_name: self.name().into(),
                        reason: e.to_string(),
                    }
                })?;
                value["success"] = json!(true);
                value["purpose"] = json!(request.purpose);
                value
            }
            Err(error) => {
                self.audit_failure(&error, &request.query);
                debug!(%request_id, error = %error, "Query request failed");
                json!({
                    "success": false,
                    "error": self.failure_message(&error),
                })
            }
        };

        let success = payload["success"].as_bool().unwrap_or(false);
        let output = serde_json::to_string(&payload).map_err(|e| ToolError::ExecutionFailed {
            tool_name: self.name().into(),
            reason: e.to_string(),
        })?;

        Ok(ToolResult {
            call_id: String::new(),
            success,
            output,
            data: Some(payload),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use tableward_core::{Operation, PolicyConfig, PolicyMode, Row, TablePolicy};
    use tableward_executor::InMemoryExecutor;

    fn orders_rows(n: usize) -> (Vec<String>, Vec<Row>) {
        let columns = vec!["id".to_string(), "status".to_string()];
        let rows = (0..n)
            .map(|i| {
                let mut row = Row::new();
                row.insert("id".into(), json!(i as i64));
                row.insert("status".into(), json!("open"));
                row
            })
            .collect();
        (columns, rows)
    }

    fn whitelist_orders(operations: Vec<Operation>) -> PolicyConfig {
        let mut tables = HashMap::new();
        tables.insert(
            "dbo.orders".to_string(),
            TablePolicy {
                enabled: true,
                operations,
                columns: vec!["*".into()],
                row_filter: None,
            },
        );
        PolicyConfig {
            mode: PolicyMode::Whitelist,
            tables,
        }
    }

    fn make_tool(policy: PolicyConfig, executor: InMemoryExecutor) -> DatabaseQueryTool {
        let store = Arc::new(PolicyStore::new());
        store.upsert("agent-1", policy).unwrap();
        DatabaseQueryTool::new(
            "agent-1",
            store,
            Arc::new(executor),
            FilterContext::new(),
            Arc::new(AuditLogger::new()),
        )
    }

    #[tokio::test]
    async fn success_payload_matches_contract() {
        let (columns, rows) = orders_rows(25);
        let tool = make_tool(
            whitelist_orders(vec![Operation::Select]),
            InMemoryExecutor::new("crm").with_rows(columns, rows),
        );

        let result = tool
            .execute(json!({"query": "SELECT * FROM dbo.orders", "purpose": "inspect"}))
            .await
            .unwrap();
        assert!(result.success);

        let payload = result.data.unwrap();
        assert_eq!(payload["success"], json!(true));
        assert_eq!(payload["database"], json!("crm"));
        assert_eq!(payload["purpose"], json!("inspect"));
        assert_eq!(payload["totalCount"], json!(25));
        assert_eq!(payload["returnedCount"], json!(10));
        assert_eq!(payload["limited"], json!(true));
        assert_eq!(payload["results"].as_array().unwrap().len(), 10);
        assert!(payload["schema"].as_array().is_some());
    }

    #[tokio::test]
    async fn policy_violation_is_structured_failure() {
        let (columns, rows) = orders_rows(5);
        let tool = make_tool(
            whitelist_orders(vec![Operation::Select]),
            InMemoryExecutor::new("crm").with_rows(columns, rows),
        );

        let result = tool
            .execute(json!({"query": "DELETE FROM dbo.orders", "purpose": "cleanup"}))
            .await
            .unwrap();
        assert!(!result.success);

        let payload = result.data.unwrap();
        assert_eq!(payload["success"], json!(false));
        let error = payload["error"].as_str().unwrap();
        assert!(error.contains("DELETE"));
        assert!(error.contains("dbo.orders"));
    }

    #[tokio::test]
    async fn missing_query_argument_is_a_tool_error() {
        let tool = make_tool(
            whitelist_orders(vec![Operation::Select]),
            InMemoryExecutor::new("crm"),
        );
        let err = tool.execute(json!({"purpose": "nothing"})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn missing_policy_is_a_configuration_failure() {
        let store = Arc::new(PolicyStore::new());
        let tool = DatabaseQueryTool::new(
            "agent-unknown",
            store,
            Arc::new(InMemoryExecutor::new("crm")),
            FilterContext::new(),
            Arc::new(AuditLogger::new()),
        );

        let result = tool
            .execute(json!({"query": "SELECT 1", "purpose": "ping"}))
            .await
            .unwrap();
        assert!(!result.success);
        let payload = result.data.unwrap();
        assert!(payload["error"].as_str().unwrap().contains("misconfigured"));
    }

    #[tokio::test]
    async fn execution_error_is_sanitized() {
        let mut tables = HashMap::new();
        tables.insert(
            "dbo.orders".to_string(),
            TablePolicy {
                enabled: true,
                operations: vec![Operation::Select],
                columns: vec!["*".into()],
                row_filter: Some("org_id = '{org}'".into()),
            },
        );
        let policy = PolicyConfig {
            mode: PolicyMode::Whitelist,
            tables,
        };

        let store = Arc::new(PolicyStore::new());
        store.upsert("agent-1", policy).unwrap();
        let executor =
            InMemoryExecutor::new("crm").failing(tableward_core::ExecutionError::Driver {
                message: "syntax error near \"org_id = 'acme-corp-1234'\"".into(),
            });
        let tool = DatabaseQueryTool::new(
            "agent-1",
            store,
            Arc::new(executor),
            FilterContext::new().with("org", "acme-corp-1234"),
            Arc::new(AuditLogger::new()),
        );

        let result = tool
            .execute(json!({"query": "SELECT * FROM dbo.orders", "purpose": "check"}))
            .await
            .unwrap();
        assert!(!result.success);
        let error = result.data.unwrap()["error"].as_str().unwrap().to_string();
        assert!(!error.contains("acme-corp-1234"));
        assert!(error.contains("[redacted]"));
    }

    #[tokio::test]
    async fn unbound_filter_binding_never_runs_unfiltered() {
        let mut tables = HashMap::new();
        tables.insert(
            "dbo.orders".to_string(),
            TablePolicy {
                enabled: true,
                operations: vec![Operation::Select],
                columns: vec!["*".into()],
                row_filter: Some("org_id = '{org}'".into()),
            },
        );
        let policy = PolicyConfig {
            mode: PolicyMode::Whitelist,
            tables,
        };
        let (columns, rows) = orders_rows(5);
        let tool = make_tool(policy, InMemoryExecutor::new("crm").with_rows(columns, rows));

        let result = tool
            .execute(json!({"query": "SELECT * FROM dbo.orders", "purpose": "check"}))
            .await
            .unwrap();
        assert!(!result.success, "must not fall through to execution");
        let payload = result.data.unwrap();
        assert!(payload["error"].as_str().unwrap().contains("misconfigured"));
    }

    #[tokio::test]
    async fn audit_records_allowed_and_denied() {
        let (columns, rows) = orders_rows(2);
        let store = Arc::new(PolicyStore::new());
        store
            .upsert("agent-1", whitelist_orders(vec![Operation::Select]))
            .unwrap();
        let audit = Arc::new(AuditLogger::new());
        let tool = DatabaseQueryTool::new(
            "agent-1",
            store,
            Arc::new(InMemoryExecutor::new("crm").with_rows(columns, rows)),
            FilterContext::new(),
            audit.clone(),
        );

        tool.execute(json!({"query": "SELECT * FROM dbo.orders", "purpose": "a"}))
            .await
            .unwrap();
        tool.execute(json!({"query": "SELECT * FROM dbo.users", "purpose": "b"}))
            .await
            .unwrap();

        assert_eq!(audit.entries_by_outcome(&AuditOutcome::Success).len(), 1);
        let denied = audit.entries_by_outcome(&AuditOutcome::Denied);
        assert_eq!(denied.len(), 1);
        assert_eq!(denied[0].target, "dbo.users");
    }

    #[tokio::test]
    async fn purpose_text_never_reaches_the_statement() {
        // A hostile purpose string must not affect classification.
        let (columns, rows) = orders_rows(2);
        let tool = make_tool(
            whitelist_orders(vec![Operation::Select]),
            InMemoryExecutor::new("crm").with_rows(columns, rows),
        );
        let result = tool
            .execute(json!({
                "query": "SELECT * FROM dbo.orders",
                "purpose": "'; DELETE FROM dbo.orders; --"
            }))
            .await
            .unwrap();
        assert!(result.success);
    }

    #[test]
    fn tool_spec_shape() {
        let tool = make_tool(
            whitelist_orders(vec![Operation::Select]),
            InMemoryExecutor::new("crm"),
        );
        let spec = tool.spec();
        assert_eq!(spec.name, "database_query");
        assert!(spec.parameters["required"]
            .as_array()
            .unwrap()
            .iter()
            .any(|v| v == "query"));
    }
}
