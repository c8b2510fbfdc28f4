//! Runs every configured sync job.

use super::connect;
use crate::store::ConfigStore;
use poupon_engine::{run_sync_jobs, CancelToken, WorkflowConfig};
use tracing::warn;

/// Syncs all configured master → slave pairs.
pub fn run(store: &ConfigStore, workflow: &WorkflowConfig) -> Result<(), Box<dyn std::error::Error>> {
    let logins = store.read_logins()?;
    let config = store.read_sync_config()?;

    if config.workspaces.is_empty() {
        println!(
            "No sync jobs configured in {}; run with --config first.",
            store.sync_config_path().display()
        );
        return Ok(());
    }

    let summary = run_sync_jobs(&config, &logins, workflow, &CancelToken::new(), connect)?;

    for outcome in &summary.outcomes {
        println!(
            "✓ {} -> {} [{}]: {} upserted, {} deleted",
            outcome.master,
            outcome.slave,
            outcome.tag,
            outcome.report.plan.upsert().len(),
            outcome.report.deletions.deleted.len()
        );
        for (uri, error) in &outcome.report.deletions.failed {
            println!("  ! could not delete {uri}: {error}");
        }
    }
    for domain in &summary.skipped_domains {
        warn!(domain = %domain, "skipped; run with --auth for this domain");
        println!("- skipped {domain}: no stored login");
    }

    Ok(())
}
