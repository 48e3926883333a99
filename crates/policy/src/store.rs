//! Per-agent policy store with snapshot reads.
//!
//! Policies are read on every tool invocation and written only through
//! administrative updates. A reader takes an `Arc` snapshot, so an update
//! committed mid-request never changes the policy an in-flight evaluation
//! sees; it takes effect for requests that begin afterwards.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tableward_core::{ConfigurationError, PolicyConfig};
use tracing::info;

/// Thread-safe store mapping agent id to its active policy.
pub struct PolicyStore {
    agents: RwLock<HashMap<String, Arc<PolicyConfig>>>,
}

impl PolicyStore {
    pub fn new() -> Self {
        Self {
            agents: RwLock::new(HashMap::new()),
        }
    }

    /// Install or replace an agent's policy. The policy is validated before
    /// it becomes visible; a malformed document never replaces a good one.
    pub fn upsert(&self, agent_id: &str, config: PolicyConfig) -> Result<(), ConfigurationError> {
        config.validate()?;
        let mut agents = self.agents.write().unwrap_or_else(|e| e.into_inner());
        agents.insert(agent_id.to_string(), Arc::new(config));
        info!(agent_id, "Policy installed");
        Ok(())
    }

    /// Snapshot of the agent's current policy. The returned `Arc` stays
    /// valid for the whole evaluation even if the policy is replaced.
    pub fn snapshot(&self, agent_id: &str) -> Option<Arc<PolicyConfig>> {
        let agents = self.agents.read().unwrap_or_else(|e| e.into_inner());
        agents.get(agent_id).cloned()
    }

    /// Remove an agent's policy. Returns whether one existed.
    pub fn remove(&self, agent_id: &str) -> bool {
        let mut agents = self.agents.write().unwrap_or_else(|e| e.into_inner());
        agents.remove(agent_id).is_some()
    }

    /// All agent ids with an installed policy, sorted.
    pub fn agent_ids(&self) -> Vec<String> {
        let agents = self.agents.read().unwrap_or_else(|e| e.into_inner());
        let mut ids: Vec<String> = agents.keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl Default for PolicyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PolicyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self
            .agents
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len();
        f.debug_struct("PolicyStore")
            .field("agent_count", &count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tableward_core::{Operation, PolicyMode, TablePolicy};

    fn orders_policy() -> PolicyConfig {
        let mut tables = HashMap::new();
        tables.insert(
            "dbo.orders".to_string(),
            TablePolicy {
                enabled: true,
                operations: vec![Operation::Select],
                columns: vec!["*".into()],
                row_filter: None,
            },
        );
        PolicyConfig {
            mode: PolicyMode::Whitelist,
            tables,
        }
    }

    #[test]
    fn upsert_and_snapshot() {
        let store = PolicyStore::new();
        store.upsert("agent-1", orders_policy()).unwrap();

        let snapshot = store.snapshot("agent-1").unwrap();
        assert!(snapshot.is_reachable("dbo.orders"));
        assert!(store.snapshot("agent-2").is_none());
    }

    #[test]
    fn snapshot_survives_replacement() {
        let store = PolicyStore::new();
        store.upsert("agent-1", orders_policy()).unwrap();
        let before = store.snapshot("agent-1").unwrap();

        // Replace with an empty whitelist; the held snapshot is unchanged.
        store
            .upsert(
                "agent-1",
                PolicyConfig {
                    mode: PolicyMode::Whitelist,
                    tables: HashMap::new(),
                },
            )
            .unwrap();

        assert!(before.is_reachable("dbo.orders"));
        let after = store.snapshot("agent-1").unwrap();
        assert!(!after.is_reachable("dbo.orders"));
    }

    #[test]
    fn malformed_policy_never_installed() {
        let store = PolicyStore::new();
        store.upsert("agent-1", orders_policy()).unwrap();

        let mut tables = HashMap::new();
        tables.insert(
            "dbo.orders".to_string(),
            TablePolicy {
                enabled: true,
                operations: vec![Operation::Select],
                columns: vec!["*".into()],
                row_filter: Some("org_id = '{org".into()),
            },
        );
        let bad = PolicyConfig {
            mode: PolicyMode::Whitelist,
            tables,
        };
        assert!(store.upsert("agent-1", bad).is_err());

        // The previous policy is still active.
        let snapshot = store.snapshot("agent-1").unwrap();
        assert!(snapshot.is_reachable("dbo.orders"));
    }

    #[test]
    fn remove_and_list() {
        let store = PolicyStore::new();
        store.upsert("beta", orders_policy()).unwrap();
        store.upsert("alpha", orders_policy()).unwrap();

        assert_eq!(store.agent_ids(), vec!["alpha", "beta"]);
        assert!(store.remove("beta"));
        assert!(!store.remove("beta"));
        assert_eq!(store.agent_ids(), vec!["alpha"]);
    }
}
