//! CLI commands for inspecting policy documents.

use std::path::Path;
use tableward_config::load_policy_file;
use tableward_core::PolicyMode;

/// Validate a policy JSON document and report what it grants.
pub fn check(file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let policy = load_policy_file(file)?;

    let mode = match policy.mode {
        PolicyMode::Whitelist => "whitelist",
        PolicyMode::Blacklist => "blacklist",
    };
    println!("Policy OK ({mode} mode, {} table entries)", policy.tables.len());

    let mut names: Vec<&String> = policy.tables.keys().collect();
    names.sort();
    for name in names {
        let table = &policy.tables[name];
        let operations: Vec<&str> = table.operations.iter().map(|o| o.as_str()).collect();
        let columns = if table.allows_all_columns() {
            "all columns".to_string()
        } else {
            format!("{} columns", table.columns.len())
        };
        let filter = if table.has_row_filter() {
            ", row filter"
        } else {
            ""
        };
        let status = if table.enabled { "enabled" } else { "disabled" };
        println!(
            "  {name}: {status}, [{}], {columns}{filter}",
            operations.join(", ")
        );
    }
    Ok(())
}

/// List the tables a policy explicitly enables.
pub fn tables(file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let policy = load_policy_file(file)?;

    let listed = policy.listed_tables();
    if listed.is_empty() {
        println!("No tables enabled.");
    } else {
        for name in &listed {
            println!("{name}");
        }
    }
    if policy.mode == PolicyMode::Blacklist {
        println!("(blacklist mode: unlisted tables are also reachable)");
    }
    Ok(())
}
