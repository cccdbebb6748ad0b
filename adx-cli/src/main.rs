//! `adx` — management-plane utility for Azure Data Explorer clusters
//!
//! Runs one-off management commands and policy reads against a cluster using
//! the same configuration resolution the connector itself uses.

use std::process;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use adx_core::identity::{build_resource_id, POLICY_SEGMENT};
use adx_core::{ClusterConfig, CommandExecutor, EnvDefaults, RowSet};
use adx_provider::{
    run_async_operation, KustoConnectionCache, OperationWait, PolicyDispatcher, PolicyRead,
    ProviderError,
};

#[derive(Parser)]
#[command(name = "adx")]
#[command(about = "Management-plane utility for Azure Data Explorer clusters", long_about = None)]
struct Cli {
    #[command(flatten)]
    cluster: ClusterArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Connection settings; anything omitted falls back to the ADX_* environment
/// variables.
#[derive(Args)]
struct ClusterArgs {
    /// Cluster endpoint, e.g. https://mycluster.westeurope.kusto.windows.net
    #[arg(long)]
    uri: Option<String>,

    /// Service principal client id
    #[arg(long)]
    client_id: Option<String>,

    /// Service principal client secret
    #[arg(long)]
    client_secret: Option<String>,

    /// AAD tenant id
    #[arg(long)]
    tenant_id: Option<String>,

    /// Authenticate with the ambient managed identity instead of a service
    /// principal
    #[arg(long)]
    use_default_credentials: bool,
}

impl ClusterArgs {
    fn resolve(&self) -> ClusterConfig {
        let object = ClusterConfig {
            client_id: self.client_id.clone().unwrap_or_default(),
            client_secret: self.client_secret.clone().unwrap_or_default(),
            tenant_id: self.tenant_id.clone().unwrap_or_default(),
            uri: self.uri.clone().unwrap_or_default(),
            use_default_credentials: self.use_default_credentials,
        };
        ClusterConfig::resolve(
            Some(&object),
            &ClusterConfig::default(),
            &EnvDefaults::from_env(),
        )
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a management command against a database
    Exec {
        /// Target database
        #[arg(long)]
        database: String,

        /// The management command to run
        command: String,

        /// Treat the response as an async operation id and poll to completion
        #[arg(long = "async")]
        wait_async: bool,

        /// Poll interval in seconds for --async
        #[arg(long, default_value_t = 5)]
        poll_interval: u64,

        /// Overall timeout in seconds for --async
        #[arg(long, default_value_t = 1800)]
        timeout: u64,
    },
    /// Show a policy attached to an entity
    ShowPolicy {
        /// Target database
        #[arg(long)]
        database: String,

        /// Entity kind, e.g. table or materialized-view
        #[arg(long)]
        entity_kind: String,

        /// Entity name
        #[arg(long)]
        entity_name: String,

        /// Policy kind, e.g. caching or retention
        #[arg(long)]
        policy_kind: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("{} {}", "error:".red().bold(), err);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), ProviderError> {
    let config = cli.cluster.resolve();
    let cache = KustoConnectionCache::default();
    let client = cache.get_or_create(&config)?;

    match cli.command {
        Commands::Exec {
            database,
            command,
            wait_async,
            poll_interval,
            timeout,
        } => {
            if wait_async {
                let wait = OperationWait::new(
                    Duration::from_secs(poll_interval),
                    Duration::from_secs(timeout),
                );
                let details =
                    run_async_operation(client.as_ref(), &database, &command, &wait).await?;
                println!(
                    "{} operation {} completed: {}",
                    "ok:".green().bold(),
                    details.operation_id,
                    details.status
                );
            } else {
                let rows = client.execute(&database, &command).await?;
                print_rows(&rows);
            }
        }
        Commands::ShowPolicy {
            database,
            entity_kind,
            entity_name,
            policy_kind,
        } => {
            let dispatcher = PolicyDispatcher::new(client.clone());
            let id = build_resource_id(
                client.endpoint(),
                &[
                    &database,
                    &entity_kind,
                    &entity_name,
                    POLICY_SEGMENT,
                    &policy_kind,
                ],
            );
            match dispatcher.read(&id, &entity_kind, &policy_kind).await? {
                PolicyRead::Deleted => {
                    println!(
                        "{} {entity_kind} {entity_name} no longer exists",
                        "gone:".yellow().bold()
                    );
                }
                PolicyRead::Active { records, .. } => {
                    for record in records {
                        println!("{}", record.policy);
                    }
                }
            }
        }
    }
    Ok(())
}

fn print_rows(rows: &RowSet) {
    if rows.is_empty() {
        println!("{}", "(no rows)".dimmed());
        return;
    }
    println!("{}", rows.columns.join("\t").as_str().bold());
    for row in &rows.rows {
        let cells: Vec<String> = row.iter().map(render_cell).collect();
        println!("{}", cells.join("\t"));
    }
}

fn render_cell(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
