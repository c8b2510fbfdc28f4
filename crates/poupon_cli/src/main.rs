//! gp CLI
//!
//! Command-line front end for workspace backup and tag-scoped metric
//! synchronization.
//!
//! # Actions
//!
//! - `--auth` - Capture a login and store its long-lived secret
//! - `--config` - Capture a master/slave sync job
//! - `--sync` - Run every configured sync job
//! - `--backup <PROJECT_ID>` - Back up a workspace into a new one
//!
//! Several actions may be combined; they run in the order listed.

mod commands;
mod store;

use clap::{ArgGroup, Parser};
use poupon_engine::WorkflowConfig;
use poupon_protocol::ExportProjectFlags;
use std::path::PathBuf;
use store::ConfigStore;
use tracing_subscriber::EnvFilter;

/// Workspace backup and metric sync for the analytics platform.
#[derive(Parser, Debug)]
#[command(name = "gp")]
#[command(author, version, about, long_about = None)]
#[command(group(
    ArgGroup::new("action")
        .required(true)
        .multiple(true)
        .args(["auth", "config", "sync", "backup"])
))]
struct Cli {
    /// Create the login configuration file
    #[arg(long)]
    auth: bool,

    /// Create a sync metrics configuration entry
    #[arg(long)]
    config: bool,

    /// Sync metrics for every configured job
    #[arg(long)]
    sync: bool,

    /// Back up a workspace into a new workspace
    #[arg(long, value_name = "PROJECT_ID", requires_all = ["domain", "auth_token"])]
    backup: Option<String>,

    /// Organization domain of the workspace to back up
    #[arg(long)]
    domain: Option<String>,

    /// Provisioning token used to create the backup workspace
    #[arg(long, value_name = "TOKEN")]
    auth_token: Option<String>,

    /// Include users and their roles in the backup
    #[arg(long, requires = "backup")]
    include_users: bool,

    /// Include loaded data in the backup
    #[arg(long, requires = "backup")]
    include_data: bool,

    /// Directory holding login.json and config_sync.json
    #[arg(long, value_name = "DIR")]
    config_dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let store = match &cli.config_dir {
        Some(dir) => ConfigStore::new(dir),
        None => ConfigStore::default_location()?,
    };
    let workflow = WorkflowConfig::default().with_export_project(ExportProjectFlags {
        include_users: cli.include_users,
        include_data: cli.include_data,
        ..ExportProjectFlags::default()
    });

    if cli.auth {
        commands::auth::run(&store)?;
    }

    if cli.config {
        commands::configure::run(&store)?;
    }

    if cli.sync {
        commands::sync::run(&store, &workflow)?;
    }

    if let Some(workspace) = &cli.backup {
        let domain = cli.domain.as_deref().ok_or("--domain is required for --backup")?;
        let token = cli
            .auth_token
            .as_deref()
            .ok_or("--auth-token is required for --backup")?;
        commands::backup::run(&store, &workflow, domain, workspace, token)?;
    }

    Ok(())
}
