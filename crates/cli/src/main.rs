//! Tableward CLI — the main entry point.
//!
//! Commands:
//! - `policy check`  — Validate a policy JSON document
//! - `policy tables` — List tables a policy explicitly enables
//! - `query`         — Run one mediated query against the configured database

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "tableward",
    about = "Tableward — policy-mediated database access for AI agents",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect and validate policy documents
    Policy {
        #[command(subcommand)]
        command: PolicyCommands,
    },

    /// Run one mediated query against the configured database
    Query {
        /// Path to the platform config TOML
        #[arg(short, long, default_value = "tableward.toml")]
        config: PathBuf,

        /// Path to the policy JSON document (overrides the config file)
        #[arg(short, long)]
        policy: Option<PathBuf>,

        /// Agent id to evaluate the policy as
        #[arg(long, default_value = "cli")]
        agent: String,

        /// Row-filter binding, `name=value` (repeatable)
        #[arg(short = 'b', long = "bind")]
        bindings: Vec<String>,

        /// Maximum rows to return; -1 for all rows
        #[arg(short, long)]
        limit: Option<i64>,

        /// Stated purpose, recorded in the audit log
        #[arg(long, default_value = "cli query")]
        purpose: String,

        /// The SQL statement to run
        query: String,
    },
}

#[derive(Subcommand)]
enum PolicyCommands {
    /// Validate a policy JSON document
    Check {
        /// Path to the policy JSON document
        file: PathBuf,
    },

    /// List tables the policy explicitly enables
    Tables {
        /// Path to the policy JSON document
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Policy { command } => match command {
            PolicyCommands::Check { file } => commands::policy_cmd::check(&file)?,
            PolicyCommands::Tables { file } => commands::policy_cmd::tables(&file)?,
        },
        Commands::Query {
            config,
            policy,
            agent,
            bindings,
            limit,
            purpose,
            query,
        } => {
            commands::query::run(&config, policy.as_deref(), &agent, &bindings, limit, &purpose, &query)
                .await?
        }
    }

    Ok(())
}
