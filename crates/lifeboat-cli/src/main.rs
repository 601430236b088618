//! Lifeboat CLI: inspect and manage snapshots from an operator shell.
//!
//! Cluster access comes from LIFEBOAT_* environment variables (or the
//! in-cluster service account). See `lifeboat_core::Config`.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use lifeboat_cli::{init_tracing, snapshot_table, Services};
use lifeboat_core::models::SnapshotStoreConfig;
use lifeboat_core::Config;
use serde::Serialize;

#[derive(Parser)]
#[command(name = "lifeboat", about = "Snapshot store, snapshot and restore operations")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Snapshot store configuration
    Store {
        #[command(subcommand)]
        sub: StoreCommands,
    },
    /// Backups of applications
    Snapshots {
        #[command(subcommand)]
        sub: SnapshotCommands,
    },
    /// Restore progress
    Restore {
        #[command(subcommand)]
        sub: RestoreCommands,
    },
}

#[derive(Subcommand)]
enum StoreCommands {
    /// Print the configured store with secrets redacted
    Show,
    /// Save a store configuration and derive per-application locations
    Save {
        /// JSON file with the store configuration
        #[arg(long)]
        file: std::path::PathBuf,
        /// Application slug to derive a storage location for (repeatable)
        #[arg(long = "app")]
        apps: Vec<String>,
    },
}

#[derive(Subcommand)]
enum SnapshotCommands {
    /// List snapshots of an application, newest first
    List {
        /// Application slug
        #[arg(long)]
        app: String,
        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
    /// Show one snapshot with volumes and parsed logs
    Detail {
        /// Backup name
        name: String,
    },
    /// Request deletion of a snapshot and its stored data
    Delete {
        /// Backup name
        name: String,
    },
    /// Print parsed errors, warnings and hook runs of a snapshot
    Logs {
        /// Backup name
        name: String,
    },
}

#[derive(Subcommand)]
enum RestoreCommands {
    /// Show phase, volume progress and results of a restore
    Status {
        /// Restore name
        name: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Table,
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    let config = Config::from_env().context("Failed to load configuration")?;
    let services = Services::connect(&config).context("Failed to connect to the cluster")?;

    match cli.command {
        Commands::Store { sub } => match sub {
            StoreCommands::Show => match services.locations.read().await? {
                Some(store) => print_json(&store)?,
                None => println!("No snapshot store configured."),
            },
            StoreCommands::Save { file, apps } => {
                let raw = std::fs::read_to_string(&file)
                    .with_context(|| format!("Failed to read {}", file.display()))?;
                let store: SnapshotStoreConfig = serde_json::from_str(&raw)
                    .with_context(|| format!("Invalid store configuration in {}", file.display()))?;
                services.locations.save(&store, &apps).await?;
                print_json(&serde_json::json!({
                    "success": true,
                    "provider": store.credentials.provider_name(),
                    "appLocations": apps,
                }))?;
            }
        },
        Commands::Snapshots { sub } => match sub {
            SnapshotCommands::List { app, format } => {
                let snapshots = services.summarizer.list_snapshots(&app).await?;
                match format {
                    OutputFormat::Json => print_json(&snapshots)?,
                    OutputFormat::Table if snapshots.is_empty() => {
                        println!("No snapshots found for {}.", app)
                    }
                    OutputFormat::Table => print!("{}", snapshot_table(&snapshots)),
                }
            }
            SnapshotCommands::Detail { name } => {
                let detail = services.summarizer.snapshot_detail(&name).await?;
                print_json(&detail)?;
            }
            SnapshotCommands::Delete { name } => {
                services.backups.delete_backup(&name).await?;
                print_json(&serde_json::json!({
                    "success": true,
                    "message": format!("Deletion of {} requested", name),
                }))?;
            }
            SnapshotCommands::Logs { name } => {
                let logs = services.downloads.get_backup_logs(&name).await?;
                print_json(&logs)?;
            }
        },
        Commands::Restore { sub } => match sub {
            RestoreCommands::Status { name } => {
                let detail = services.restores.restore_status(&name).await?;
                print_json(&detail)?;
            }
        },
    }

    Ok(())
}
