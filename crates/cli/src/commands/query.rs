//! Run one mediated query from the command line.
//!
//! Builds the same pipeline an agent would use: policy store, filter
//! context, executor for the configured engine, and the query tool.

use std::path::Path;
use std::sync::Arc;
use tableward_config::{AppConfig, DatabaseEngine, load_policy_file};
use tableward_core::Tool;
use tableward_executor::{PostgresExecutor, QueryExecutor, SqliteExecutor};
use tableward_policy::{AuditLogger, FilterContext, PolicyStore, TracingSink};
use tableward_tools::DatabaseQueryTool;

#[allow(clippy::too_many_arguments)]
pub async fn run(
    config_path: &Path,
    policy_path: Option<&Path>,
    agent: &str,
    bindings: &[String],
    limit: Option<i64>,
    purpose: &str,
    query: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load_from(config_path)?;

    let policy_file = policy_path
        .map(Path::to_path_buf)
        .or(config.policy_file.clone())
        .ok_or("no policy document: pass --policy or set policy_file in the config")?;
    let policy = load_policy_file(&policy_file)?;

    let store = Arc::new(PolicyStore::new());
    store.upsert(agent, policy)?;

    let mut context = FilterContext::new();
    for binding in bindings {
        let (name, value) = binding
            .split_once('=')
            .ok_or_else(|| format!("invalid binding '{binding}': expected name=value"))?;
        context.bind(name, value);
    }

    let executor: Arc<dyn QueryExecutor> = match config.database.engine {
        DatabaseEngine::Sqlite => Arc::new(SqliteExecutor::new(&config.database).await?),
        DatabaseEngine::Postgres => Arc::new(PostgresExecutor::new(&config.database).await?),
    };

    let audit = Arc::new(AuditLogger::with_sinks(vec![Box::new(TracingSink)]));
    let tool = DatabaseQueryTool::new(agent, store, executor, context, audit);

    let mut arguments = serde_json::json!({
        "query": query,
        "purpose": purpose,
    });
    if let Some(limit) = limit {
        arguments["limit"] = serde_json::json!(limit);
    }

    let result = tool.execute(arguments).await?;
    let payload = result
        .data
        .unwrap_or_else(|| serde_json::json!({ "success": false, "error": "no payload" }));
    println!("{}", serde_json::to_string_pretty(&payload)?);

    if !result.success {
        std::process::exit(1);
    }
    Ok(())
}
