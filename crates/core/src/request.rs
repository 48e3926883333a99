//! The per-invocation request/response contract.
//!
//! A `QueryRequest` is created when the agent invokes the query tool and a
//! `QueryResult` is returned for it; neither outlives the invocation. The
//! serde field names here are the external tool contract (camelCase), so the
//! serialized form is exactly what the calling model sees.

use serde::{Deserialize, Serialize};

/// A row as returned to the agent: column name → JSON value, in column order.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Limit sentinel meaning "return every matching row".
pub const NO_LIMIT: i64 = -1;

/// Row-visibility limit applied when the caller omits `limit`.
pub const DEFAULT_LIMIT: i64 = 10;

/// One tool invocation from the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub agent_id: String,

    /// Raw statement text, authored by the model. Untrusted.
    pub query: String,

    /// Free-text rationale. Logged for audit; never authoritative.
    #[serde(default)]
    pub purpose: String,

    /// Maximum rows disclosed to the model. `-1` = all rows; absent = 10.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
}

/// Structural description of one result column, derived from the returned
/// rows rather than a schema catalog (the caller may not have one).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDescriptor {
    pub name: String,

    #[serde(rename = "type")]
    pub inferred_type: InferredType,

    /// Up to 3 distinct observed values, first-seen order.
    pub sample_values: Vec<serde_json::Value>,
}

/// Value class inferred from observed values across the returned rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InferredType {
    Number,
    Boolean,
    String,
}

/// The shaped result of one successful invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    /// Target database identifier.
    pub database: String,

    /// Echo of the executed statement (as authored, pre-augmentation).
    pub query: String,

    /// At most the effective limit of rows, in executor order.
    pub results: Vec<Row>,

    /// Full match count, computed independently of `limit`.
    pub total_count: usize,

    /// `results.len()`.
    pub returned_count: usize,

    pub schema: Vec<ColumnDescriptor>,

    pub execution_time_ms: u64,

    /// True iff more data exists beyond what the caller can see.
    pub limited: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_limit_defaults_to_absent() {
        let req: QueryRequest = serde_json::from_str(
            r#"{"agentId": "a1", "query": "SELECT 1", "purpose": "check"}"#,
        )
        .unwrap();
        assert_eq!(req.limit, None);
        assert_eq!(req.agent_id, "a1");
    }

    #[test]
    fn result_serializes_with_contract_field_names() {
        let result = QueryResult {
            database: "crm".into(),
            query: "SELECT id FROM dbo.orders".into(),
            results: vec![],
            total_count: 0,
            returned_count: 0,
            schema: vec![],
            execution_time_ms: 12,
            limited: false,
        };
        let value = serde_json::to_value(&result).unwrap();
        assert!(value.get("totalCount").is_some());
        assert!(value.get("returnedCount").is_some());
        assert!(value.get("executionTimeMs").is_some());
        assert!(value.get("limited").is_some());
    }

    #[test]
    fn column_descriptor_type_field_name() {
        let descriptor = ColumnDescriptor {
            name: "total".into(),
            inferred_type: InferredType::Number,
            sample_values: vec![json!(42)],
        };
        let value = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(value["type"], "number");
        assert_eq!(value["sampleValues"], json!([42]));
    }
}
