//! Multi-step workflows: full workspace backup and tag-scoped metric sync.
//!
//! Both workflows are strictly linear. Each stage blocks on the previous
//! one; the first error moves the orchestrator to [`WorkflowStage::Failed`]
//! and is returned. Completed steps are not rolled back, so a failed
//! backup can leave an empty target workspace behind.

use crate::client::{DeleteReport, ResourceClient};
use crate::config::{PollConfig, WorkflowConfig};
use crate::error::{EngineError, EngineResult};
use crate::plan::SyncPlan;
use crate::poller::{CancelToken, PollStatus, TaskPoller};
use crate::transport::HttpClient;
use chrono::NaiveDate;
use parking_lot::RwLock;
use poupon_protocol::{Metric, ProtocolError, TaskHandle};
use tracing::{debug, error, info, warn};

/// Stages of the backup workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupStage {
    /// Reading source metadata.
    Start,
    /// Starting the source export.
    Exporting,
    /// Creating the target workspace.
    CreatingTarget,
    /// Waiting for the export task.
    AwaitExport,
    /// Waiting for the target workspace to be enabled.
    AwaitTargetEnabled,
    /// Starting the import into the target.
    Importing,
    /// Waiting for the import task.
    AwaitImport,
    /// Backup finished.
    Done,
}

/// Stages of the metric sync workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    /// Workflow entered.
    Start,
    /// Listing metrics and building the plan.
    Diffing,
    /// Deleting stale tagged metrics.
    Deleting,
    /// Starting the partial export from master.
    Exporting,
    /// Waiting for the export task.
    AwaitExport,
    /// Starting the partial import into the slave.
    Importing,
    /// Waiting for the import task.
    AwaitImport,
    /// Sync finished.
    Done,
}

/// Where the orchestrator currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowStage {
    /// No workflow has run yet.
    Idle,
    /// Inside the backup workflow.
    Backup(BackupStage),
    /// Inside the sync workflow.
    Sync(SyncStage),
    /// The last workflow aborted.
    Failed,
}

impl WorkflowStage {
    /// Returns true while a workflow is between its start and end.
    pub fn is_active(&self) -> bool {
        !matches!(
            self,
            WorkflowStage::Idle
                | WorkflowStage::Failed
                | WorkflowStage::Backup(BackupStage::Done)
                | WorkflowStage::Sync(SyncStage::Done)
        )
    }
}

/// Result of a metric sync run.
#[derive(Debug)]
pub struct SyncReport {
    /// The diff that was executed.
    pub plan: SyncPlan,
    /// Outcome of the stale-metric deletions.
    pub deletions: DeleteReport,
}

/// Runs the backup and sync workflows over one resource client.
pub struct Orchestrator<C: HttpClient> {
    client: ResourceClient<C>,
    config: WorkflowConfig,
    cancel: CancelToken,
    stage: RwLock<WorkflowStage>,
    history: RwLock<Vec<WorkflowStage>>,
}

impl<C: HttpClient> Orchestrator<C> {
    /// Creates an orchestrator.
    pub fn new(client: ResourceClient<C>, config: WorkflowConfig) -> Self {
        Self {
            client,
            config,
            cancel: CancelToken::new(),
            stage: RwLock::new(WorkflowStage::Idle),
            history: RwLock::new(Vec::new()),
        }
    }

    /// Uses the given cancellation token for every wait.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Returns the resource client.
    pub fn client(&self) -> &ResourceClient<C> {
        &self.client
    }

    /// Returns the workflow configuration.
    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Gets the current stage.
    pub fn stage(&self) -> WorkflowStage {
        *self.stage.read()
    }

    /// Stages entered by the most recent workflow, in order.
    pub fn history(&self) -> Vec<WorkflowStage> {
        self.history.read().clone()
    }

    /// Cancels any ongoing wait.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    fn set_stage(&self, stage: WorkflowStage) {
        debug!(?stage, "workflow stage");
        *self.stage.write() = stage;
        self.history.write().push(stage);
    }

    fn finish<T>(&self, result: EngineResult<T>) -> EngineResult<T> {
        if let Err(e) = &result {
            error!(error = %e, during = ?self.stage(), "workflow aborted");
            self.set_stage(WorkflowStage::Failed);
        }
        result
    }

    fn poller(&self, config: PollConfig) -> TaskPoller {
        TaskPoller::new(config).with_cancel_token(self.cancel.clone())
    }

    /// Backs up a workspace into a new workspace and returns its id.
    ///
    /// The target is titled `Backup<today> <source title>`.
    pub fn backup_project(&self, workspace: &str, authorization_token: &str) -> EngineResult<String> {
        let today = chrono::Local::now().date_naive();
        self.backup_project_on(workspace, authorization_token, today)
    }

    /// Backs up a workspace, dating the target title with `date`.
    pub fn backup_project_on(
        &self,
        workspace: &str,
        authorization_token: &str,
        date: NaiveDate,
    ) -> EngineResult<String> {
        self.history.write().clear();
        let result = self.run_backup(workspace, authorization_token, date);
        self.finish(result)
    }

    fn run_backup(
        &self,
        workspace: &str,
        authorization_token: &str,
        date: NaiveDate,
    ) -> EngineResult<String> {
        let poller = self.poller(self.config.backup_poll);

        self.set_stage(WorkflowStage::Backup(BackupStage::Start));
        let info = self.client.project_info(workspace)?;
        let title = backup_title(date, &info.title);

        info!(workspace, "start export");
        self.set_stage(WorkflowStage::Backup(BackupStage::Exporting));
        let export = self
            .client
            .export_project(workspace, self.config.export_project)?;

        self.set_stage(WorkflowStage::Backup(BackupStage::CreatingTarget));
        let target = self.client.create_project(
            authorization_token,
            &title,
            None,
            &self.config.driver,
            info.environment,
        )?;

        self.set_stage(WorkflowStage::Backup(BackupStage::AwaitExport));
        poller.await_task(&self.client, &export)?;

        self.set_stage(WorkflowStage::Backup(BackupStage::AwaitTargetEnabled));
        self.await_enabled(&poller, &target)?;

        self.set_stage(WorkflowStage::Backup(BackupStage::Importing));
        let import = self
            .client
            .import_project(&target, transfer_token(&export)?)?;

        self.set_stage(WorkflowStage::Backup(BackupStage::AwaitImport));
        poller.await_task(&self.client, &import)?;

        self.set_stage(WorkflowStage::Backup(BackupStage::Done));
        info!(workspace, target = %target, title = %title, "backup done");
        Ok(target)
    }

    /// Waits for a freshly created workspace to finish bootstrapping.
    fn await_enabled(&self, poller: &TaskPoller, workspace: &str) -> EngineResult<u32> {
        poller.poll_until(workspace, |attempt| {
            let state = self.client.project_state(workspace)?;
            if state.is_enabled() {
                Ok(PollStatus::Done)
            } else if state.is_dead_end() {
                Err(EngineError::TaskFailed {
                    status: state.to_string(),
                    message: Some(format!("workspace {workspace} will not become enabled")),
                })
            } else {
                debug!(workspace, %state, attempt, "waiting for workspace");
                Ok(PollStatus::Pending)
            }
        })
    }

    /// Synchronizes the metrics tagged `tag` from `master` into `slave`.
    pub fn sync_metrics(&self, master: &str, slave: &str, tag: &str) -> EngineResult<SyncReport> {
        self.history.write().clear();
        let result = self.run_sync(master, slave, tag);
        self.finish(result)
    }

    fn run_sync(&self, master: &str, slave: &str, tag: &str) -> EngineResult<SyncReport> {
        let poller = self.poller(self.config.sync_poll);

        self.set_stage(WorkflowStage::Sync(SyncStage::Start));

        self.set_stage(WorkflowStage::Sync(SyncStage::Diffing));
        let master_metrics: Vec<Metric> = self.client.list_metrics(master)?.collect();
        let slave_metrics: Vec<Metric> = self.client.list_metrics(slave)?.collect();
        let plan = SyncPlan::build(&master_metrics, &slave_metrics, tag);
        debug!(
            master,
            slave,
            tag,
            upsert = plan.upsert().len(),
            delete = plan.delete().len(),
            "sync plan built"
        );

        // Delete URIs come from the slave listing; the call is scoped to master.
        self.set_stage(WorkflowStage::Sync(SyncStage::Deleting));
        let delete_uris = plan.delete_uris();
        warn!(
            workspace = master,
            "following metrics will be deleted from {slave}: {}",
            delete_uris.join(", ")
        );
        let deletions = self.client.delete_objects(master, &delete_uris)?;

        // An empty upsert set still takes the full export/import round trip.
        let upsert_uris = plan.upsert_uris();
        self.set_stage(WorkflowStage::Sync(SyncStage::Exporting));
        let export = self
            .client
            .export_objects(master, &upsert_uris, self.config.export_objects)?;

        self.set_stage(WorkflowStage::Sync(SyncStage::AwaitExport));
        info!(workspace = master, "waiting for export to finish ...");
        poller.await_task(&self.client, &export)?;

        info!(
            "following metrics will be added or updated in {slave} from master {master}: {}",
            upsert_uris.join(", ")
        );
        self.set_stage(WorkflowStage::Sync(SyncStage::Importing));
        let import = self.client.import_objects(
            slave,
            transfer_token(&export)?,
            self.config.import_objects,
        )?;

        self.set_stage(WorkflowStage::Sync(SyncStage::AwaitImport));
        info!(workspace = slave, "waiting for import to finish ...");
        poller.await_task(&self.client, &import)?;

        self.set_stage(WorkflowStage::Sync(SyncStage::Done));
        info!(master, slave, tag, "sync done");
        Ok(SyncReport { plan, deletions })
    }
}

/// Title of a backup target workspace.
pub(crate) fn backup_title(date: NaiveDate, title: &str) -> String {
    format!("Backup{} {}", date.format("%Y-%m-%d"), title)
}

fn transfer_token(handle: &TaskHandle) -> EngineResult<&str> {
    handle
        .transfer_token
        .as_deref()
        .ok_or_else(|| ProtocolError::missing("token").into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::session::{Credentials, Session};
    use crate::transport::{Method, MockHttpClient};
    use std::io;
    use std::sync::Arc;
    use std::time::Duration;
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<parking_lot::Mutex<Vec<u8>>>);

    impl LogBuffer {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock()).into_owned()
        }
    }

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for LogBuffer {
        type Writer = LogBuffer;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn logged<T>(f: impl FnOnce() -> T) -> (T, String) {
        let logs = LogBuffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .finish();
        let out = tracing::subscriber::with_default(subscriber, f);
        (out, logs.contents())
    }

    fn orchestrator() -> Orchestrator<MockHttpClient> {
        let session = Session::new(
            ClientConfig::new("https://acme.example.com"),
            MockHttpClient::new(),
        );
        session
            .client()
            .push_response(200, r#"{"userToken": {"token": "tt"}}"#);
        session.authenticate(&Credentials::secret("sst")).unwrap();
        Orchestrator::new(
            ResourceClient::new(session),
            WorkflowConfig::default().with_poll_interval(Duration::ZERO),
        )
    }

    fn mock(o: &Orchestrator<MockHttpClient>) -> &MockHttpClient {
        o.client().session().client()
    }

    fn task(status: &str) -> String {
        format!(r#"{{"taskState": {{"status": "{status}"}}}}"#)
    }

    fn project(state: &str) -> String {
        format!(
            r#"{{"project": {{"content": {{"environment": "PRODUCTION", "state": "{state}"}}, "meta": {{"title": "Sales"}}}}}}"#
        )
    }

    #[test]
    fn backup_title_format() {
        let date = NaiveDate::from_ymd_opt(2017, 5, 3).unwrap();
        assert_eq!(backup_title(date, "Sales"), "Backup2017-05-03 Sales");
    }

    #[test]
    fn backup_runs_stages_in_order() {
        let o = orchestrator();
        mock(&o)
            .push_response(200, project("ENABLED"))
            .push_response(
                200,
                r#"{"exportArtifact": {"status": {"uri": "/gdc/md/src/tasks/1/status"}, "token": "xfer"}}"#,
            )
            .push_response(201, r#"{"uri": "/gdc/projects/bkp1"}"#)
            .push_response(200, task("RUNNING"))
            .push_response(200, task("OK"))
            .push_response(200, project("PREPARING"))
            .push_response(200, project("ENABLED"))
            .push_response(200, r#"{"uri": "/gdc/md/bkp1/tasks/2/status"}"#)
            .push_response(200, task("OK"));

        let date = NaiveDate::from_ymd_opt(2017, 5, 3).unwrap();
        let target = o.backup_project_on("src", "auth", date).unwrap();
        assert_eq!(target, "bkp1");

        use BackupStage::*;
        let expected: Vec<WorkflowStage> = [
            Start,
            Exporting,
            CreatingTarget,
            AwaitExport,
            AwaitTargetEnabled,
            Importing,
            AwaitImport,
            Done,
        ]
        .into_iter()
        .map(WorkflowStage::Backup)
        .collect();
        assert_eq!(o.history(), expected);
        assert!(!o.stage().is_active());

        let requests = mock(&o).requests();
        let create = requests[3].json().unwrap();
        assert_eq!(create["project"]["meta"]["title"], "Backup2017-05-03 Sales");
        assert_eq!(create["project"]["content"]["environment"], "PRODUCTION");
        assert_eq!(create["project"]["content"]["authorizationToken"], "auth");
        // target state is polled, not the source
        assert_eq!(requests[6].url, "https://acme.example.com/gdc/projects/bkp1");
        assert_eq!(
            requests[8].json().unwrap()["importProject"]["token"],
            "xfer"
        );
    }

    #[test]
    fn backup_aborts_on_export_failure() {
        let o = orchestrator();
        mock(&o)
            .push_response(200, project("ENABLED"))
            .push_response(
                200,
                r#"{"exportArtifact": {"status": {"uri": "/gdc/md/src/tasks/1/status"}, "token": "xfer"}}"#,
            )
            .push_response(201, r#"{"uri": "/gdc/projects/bkp1"}"#)
            .push_response(200, task("ERROR"));

        let result = o.backup_project("src", "auth");
        assert!(matches!(result, Err(EngineError::TaskFailed { .. })));
        assert_eq!(o.stage(), WorkflowStage::Failed);
        assert_eq!(
            o.history().iter().rev().nth(1),
            Some(&WorkflowStage::Backup(BackupStage::AwaitExport))
        );
        // no import attempted
        assert!(mock(&o)
            .requests()
            .iter()
            .all(|r| !r.url.ends_with("/maintenance/import")));
    }

    #[test]
    fn backup_fails_when_target_is_deleted() {
        let o = orchestrator();
        mock(&o)
            .push_response(200, project("ENABLED"))
            .push_response(
                200,
                r#"{"exportArtifact": {"status": {"uri": "/t/1"}, "token": "xfer"}}"#,
            )
            .push_response(201, r#"{"uri": "/gdc/projects/bkp1"}"#)
            .push_response(200, task("OK"))
            .push_response(200, project("DELETED"));

        match o.backup_project("src", "auth") {
            Err(EngineError::TaskFailed { status, .. }) => assert_eq!(status, "DELETED"),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn sync_deletes_exports_and_imports() {
        let o = orchestrator();
        mock(&o)
            .push_response(
                200,
                r#"{"query": {"entries": [
                    {"identifier": "A", "link": "/gdc/md/m/obj/1", "tags": "kpi sync", "category": "metric"},
                    {"identifier": "B", "link": "/gdc/md/m/obj/2", "tags": "kpi", "category": "metric"}
                ]}}"#,
            )
            .push_response(
                200,
                r#"{"query": {"entries": [
                    {"identifier": "A", "link": "/gdc/md/s/obj/1", "tags": "sync", "category": "metric"},
                    {"identifier": "C", "link": "/gdc/md/s/obj/3", "tags": "sync", "category": "metric"}
                ]}}"#,
            )
            .push_response(204, "")
            .push_response(
                200,
                r#"{"partialMDArtifact": {"status": {"uri": "/gdc/md/m/tasks/1/status"}, "token": "part"}}"#,
            )
            .push_response(200, task("OK"))
            .push_response(200, r#"{"uri": "/gdc/md/s/tasks/2/status"}"#)
            .push_response(200, task("RUNNING"))
            .push_response(200, task("OK"));

        let report = o.sync_metrics("m", "s", "sync").unwrap();
        assert_eq!(report.deletions.deleted, vec!["/gdc/md/s/obj/3".to_string()]);

        let requests = mock(&o).requests();
        assert_eq!(requests[3].method, Method::Delete);
        assert_eq!(requests[3].url, "https://acme.example.com/gdc/md/s/obj/3");
        assert_eq!(
            requests[4].json().unwrap()["partialMDExport"]["uris"][0],
            "/gdc/md/m/obj/1"
        );
        assert_eq!(
            requests[6].url,
            "https://acme.example.com/gdc/md/s/maintenance/partialmdimport"
        );
        assert_eq!(requests[6].json().unwrap()["partialMDImport"]["token"], "part");

        use SyncStage::*;
        let expected: Vec<WorkflowStage> = [
            Start,
            Diffing,
            Deleting,
            Exporting,
            AwaitExport,
            Importing,
            AwaitImport,
            Done,
        ]
        .into_iter()
        .map(WorkflowStage::Sync)
        .collect();
        assert_eq!(o.history(), expected);
    }

    #[test]
    fn sync_without_tagged_master_metrics_still_transfers() {
        let o = orchestrator();
        mock(&o)
            .push_response(200, r#"{"query": {"entries": []}}"#)
            .push_response(200, r#"{"query": {"entries": []}}"#)
            .push_response(
                200,
                r#"{"partialMDArtifact": {"status": {"uri": "/gdc/md/m/tasks/1/status"}, "token": "part"}}"#,
            )
            .push_response(200, task("OK"))
            .push_response(200, r#"{"uri": "/gdc/md/s/tasks/2/status"}"#)
            .push_response(200, task("OK"));

        let (report, logs) = logged(|| o.sync_metrics("m", "s", "sync"));
        let report = report.unwrap();
        assert!(report.plan.is_empty());
        assert!(report.deletions.deleted.is_empty());

        // the deletion warning is emitted even for an empty list, before the upsert notice
        let warned = logs.find("following metrics will be deleted from s:");
        let upserted = logs.find("following metrics will be added or updated in s");
        assert!(warned.is_some(), "missing deletion warning in {logs}");
        assert!(warned < upserted);

        let requests = mock(&o).requests();
        // token exchange, two listings, export, status, import, status
        assert_eq!(requests.len(), 7);
        assert!(requests.iter().all(|r| r.method != Method::Delete));
        let export = requests[3].json().unwrap();
        assert_eq!(
            export["partialMDExport"]["uris"].as_array().map(Vec::len),
            Some(0)
        );
        assert_eq!(requests[5].json().unwrap()["partialMDImport"]["token"], "part");

        use SyncStage::*;
        let expected: Vec<WorkflowStage> = [
            Start,
            Diffing,
            Deleting,
            Exporting,
            AwaitExport,
            Importing,
            AwaitImport,
            Done,
        ]
        .into_iter()
        .map(WorkflowStage::Sync)
        .collect();
        assert_eq!(o.history(), expected);
    }

    #[test]
    fn sync_listing_failure_aborts() {
        let o = orchestrator();
        mock(&o).push_response(404, "no such workspace");

        let result = o.sync_metrics("missing", "s", "sync");
        assert!(matches!(result, Err(EngineError::Api { status: 404, .. })));
        assert_eq!(o.stage(), WorkflowStage::Failed);
        assert_eq!(mock(&o).request_count(), 2);
    }

    #[test]
    fn cancelled_sync_stops_at_first_wait() {
        let o = orchestrator();
        mock(&o)
            .push_response(
                200,
                r#"{"query": {"entries": [{"identifier": "A", "link": "/gdc/md/m/obj/1", "tags": "sync"}]}}"#,
            )
            .push_response(200, r#"{"query": {"entries": []}}"#)
            .push_response(
                200,
                r#"{"partialMDArtifact": {"status": {"uri": "/t/1"}, "token": "part"}}"#,
            );
        o.cancel();

        let result = o.sync_metrics("m", "s", "sync");
        assert!(matches!(result, Err(EngineError::Cancelled)));
        assert_eq!(mock(&o).request_count(), 4);
    }
}
