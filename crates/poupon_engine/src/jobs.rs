//! Runs every configured sync job.

use crate::client::ResourceClient;
use crate::config::WorkflowConfig;
use crate::error::EngineResult;
use crate::orchestrator::{Orchestrator, SyncReport};
use crate::poller::CancelToken;
use crate::session::Session;
use crate::transport::HttpClient;
use poupon_protocol::{LoginFile, SyncConfigFile};
use tracing::{info, warn};

/// One finished master → slave sync.
#[derive(Debug)]
pub struct JobOutcome {
    /// Master workspace id.
    pub master: String,
    /// Slave workspace id.
    pub slave: String,
    /// Tag the sync was scoped to.
    pub tag: String,
    /// What the sync did.
    pub report: SyncReport,
}

/// Result of a job run.
#[derive(Debug, Default)]
pub struct JobsSummary {
    /// Completed syncs, in execution order.
    pub outcomes: Vec<JobOutcome>,
    /// Domains skipped for lack of a stored secret.
    pub skipped_domains: Vec<String>,
}

impl JobsSummary {
    /// Number of completed syncs.
    pub fn completed(&self) -> usize {
        self.outcomes.len()
    }

    /// Returns true if no stale-metric deletion failed.
    pub fn deletions_complete(&self) -> bool {
        self.outcomes.iter().all(|o| o.report.deletions.is_complete())
    }
}

/// Runs the sync jobs of `config` sequentially.
///
/// `connect` opens an authenticated session for a domain given its stored
/// secret; it is called once per job entry. Entries whose domain has no
/// stored secret are skipped. The first failing sync aborts the run.
pub fn run_sync_jobs<C, F>(
    config: &SyncConfigFile,
    logins: &LoginFile,
    workflow: &WorkflowConfig,
    cancel: &CancelToken,
    mut connect: F,
) -> EngineResult<JobsSummary>
where
    C: HttpClient,
    F: FnMut(&str, &str) -> EngineResult<Session<C>>,
{
    let mut summary = JobsSummary::default();

    for target in &config.workspaces {
        let domain = target.sub_domain.as_str();
        let Some(secret) = logins.secret_for(domain) else {
            warn!(domain, master = %target.master_pid, "no stored login for domain, skipping");
            if !summary.skipped_domains.iter().any(|d| d == domain) {
                summary.skipped_domains.push(domain.to_string());
            }
            continue;
        };

        let session = connect(domain, secret)?;
        let orchestrator = Orchestrator::new(ResourceClient::new(session), workflow.clone())
            .with_cancel_token(cancel.clone());

        for slave in &target.slaves {
            info!(
                "sync {} -> {} with tag {}",
                target.master_pid, slave.slave_pid, slave.tag
            );
            let report =
                orchestrator.sync_metrics(&target.master_pid, &slave.slave_pid, &slave.tag)?;
            summary.outcomes.push(JobOutcome {
                master: target.master_pid.clone(),
                slave: slave.slave_pid.clone(),
                tag: slave.tag.clone(),
                report,
            });
        }
    }

    info!(
        completed = summary.completed(),
        skipped = summary.skipped_domains.len(),
        "sync jobs finished"
    );
    Ok(summary)
}
