//! Agent-facing tools for Tableward.
//!
//! The database query tool is the only capability this layer exposes: a
//! policy-mediated "run a query" boundary. The registry exists so the
//! surrounding agent loop can advertise and dispatch it like any other
//! tool.

pub mod database_query;

pub use database_query::DatabaseQueryTool;

use std::sync::Arc;
use tableward_core::tool::ToolRegistry;
use tableward_executor::QueryExecutor;
use tableward_policy::{AuditLogger, FilterContext, PolicyStore};

/// Create a tool registry wired with the database query tool for one agent.
pub fn default_registry(
    agent_id: &str,
    store: Arc<PolicyStore>,
    executor: Arc<dyn QueryExecutor>,
    context: FilterContext,
    audit: Arc<AuditLogger>,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(DatabaseQueryTool::new(
        agent_id, store, executor, context, audit,
    )));
    registry
}
