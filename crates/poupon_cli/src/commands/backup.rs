//! Workspace backup command.

use super::connect;
use crate::store::ConfigStore;
use poupon_engine::{Orchestrator, ResourceClient, WorkflowConfig};
use tracing::info;

/// Backs up `workspace` into a new workspace and prints its id.
///
/// Uses the stored secret of `domain`. `authorization_token` is the
/// provisioning token required to create workspaces.
pub fn run(
    store: &ConfigStore,
    workflow: &WorkflowConfig,
    domain: &str,
    workspace: &str,
    authorization_token: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let logins = store.read_logins()?;
    let secret = logins
        .secret_for(domain)
        .ok_or_else(|| format!("no stored login for {domain}; run with --auth first"))?;

    let session = connect(domain, secret)?;
    let orchestrator = Orchestrator::new(ResourceClient::new(session), workflow.clone());

    info!(workspace, domain, "starting backup");
    let target = orchestrator.backup_project(workspace, authorization_token)?;

    println!("✓ Backup created");
    println!("  Source: {workspace}");
    println!("  Backup: {target}");
    Ok(())
}
