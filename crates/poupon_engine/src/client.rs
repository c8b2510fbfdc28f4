//! Typed operations over the platform endpoints.
//!
//! Every call is one HTTP request made with the session headers. A 2xx
//! response is unwrapped from its envelope; anything else becomes
//! [`EngineError::Api`]. Object deletion is the one partial-failure
//! tolerant operation.

use crate::error::{EngineError, EngineResult};
use crate::session::Session;
use crate::transport::{HttpClient, HttpResponse};
use poupon_protocol::{
    decode, encode, CreateProjectRequest, Environment, ExportObjectsFlags, ExportObjectsRequest,
    ExportProjectFlags, ExportProjectRequest, ExportResponse, ImportObjectsFlags,
    ImportObjectsRequest, ImportProjectRequest, Metric, MetricsQuery, ProjectEnvelope,
    ProjectInfo, ProjectState, TaskHandle, TaskStateResponse, UriResponse,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Write;
use tracing::{debug, info, warn};

/// Outcome of a best-effort batch deletion.
#[derive(Debug, Default)]
pub struct DeleteReport {
    /// URIs deleted.
    pub deleted: Vec<String>,
    /// URIs that could not be deleted, with the reason.
    pub failed: Vec<(String, EngineError)>,
}

impl DeleteReport {
    /// Returns true if every deletion succeeded.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Client for the platform's resource endpoints.
pub struct ResourceClient<C: HttpClient> {
    session: Session<C>,
}

impl<C: HttpClient> ResourceClient<C> {
    /// Creates a resource client over an (authenticated) session.
    pub fn new(session: Session<C>) -> Self {
        Self { session }
    }

    /// Returns the session.
    pub fn session(&self) -> &Session<C> {
        &self.session
    }

    /// Lists the metrics of a workspace.
    ///
    /// The server returns all entries at once; only entries categorized as
    /// metrics are yielded.
    pub fn list_metrics(&self, workspace: &str) -> EngineResult<impl Iterator<Item = Metric>> {
        let query: MetricsQuery = self.get_json(&metrics_path(workspace))?;
        Ok(query.into_metrics())
    }

    /// Writes the unfiltered metric query document of a workspace.
    pub fn download_metrics<W: Write>(&self, workspace: &str, mut writer: W) -> EngineResult<()> {
        let response = self.get(&metrics_path(workspace))?;
        writer.write_all(response.body.as_bytes())?;
        writer.flush()?;
        Ok(())
    }

    /// Starts a full export of a workspace.
    pub fn export_project(
        &self,
        workspace: &str,
        flags: ExportProjectFlags,
    ) -> EngineResult<TaskHandle> {
        let path = format!("/gdc/md/{workspace}/maintenance/export");
        let response: ExportResponse =
            self.post_json(&path, &ExportProjectRequest::from(flags))?;
        let handle = response.into_handle();
        debug!(workspace, status_uri = %handle.status_uri, "export started");
        Ok(handle)
    }

    /// Starts importing a full export into a workspace.
    pub fn import_project(&self, workspace: &str, transfer_token: &str) -> EngineResult<TaskHandle> {
        let path = format!("/gdc/md/{workspace}/maintenance/import");
        let response: UriResponse =
            self.post_json(&path, &ImportProjectRequest::new(transfer_token))?;
        debug!(workspace, status_uri = %response.uri, "import started");
        Ok(TaskHandle::import(response.uri))
    }

    /// Creates a workspace and returns its id.
    ///
    /// `authorization_token` is the provisioning token issued by the
    /// platform. The id is the last path segment of the created URI.
    pub fn create_project(
        &self,
        authorization_token: &str,
        title: &str,
        summary: Option<&str>,
        driver: &str,
        environment: Environment,
    ) -> EngineResult<String> {
        let request =
            CreateProjectRequest::new(authorization_token, title, summary, driver, environment);
        let response: UriResponse = self.post_json("/gdc/projects", &request)?;
        let id = response.last_segment()?.to_string();
        info!(workspace = %id, title, %environment, "workspace created");
        Ok(id)
    }

    /// Reads workspace metadata.
    pub fn project_info(&self, workspace: &str) -> EngineResult<ProjectInfo> {
        let envelope: ProjectEnvelope = self.get_json(&format!("/gdc/projects/{workspace}"))?;
        Ok(envelope.into_info())
    }

    /// Reads the bootstrap state of a workspace.
    pub fn project_state(&self, workspace: &str) -> EngineResult<ProjectState> {
        Ok(self.project_info(workspace)?.state)
    }

    /// Starts a partial export of the given objects.
    pub fn export_objects(
        &self,
        workspace: &str,
        uris: &[String],
        flags: ExportObjectsFlags,
    ) -> EngineResult<TaskHandle> {
        let path = format!("/gdc/md/{workspace}/maintenance/partialmdexport");
        let response: ExportResponse =
            self.post_json(&path, &ExportObjectsRequest::new(uris, flags))?;
        let handle = response.into_handle();
        debug!(workspace, objects = uris.len(), status_uri = %handle.status_uri, "partial export started");
        Ok(handle)
    }

    /// Starts importing a partial export into a workspace.
    pub fn import_objects(
        &self,
        workspace: &str,
        transfer_token: &str,
        flags: ImportObjectsFlags,
    ) -> EngineResult<TaskHandle> {
        let path = format!("/gdc/md/{workspace}/maintenance/partialmdimport");
        let response: UriResponse =
            self.post_json(&path, &ImportObjectsRequest::new(transfer_token, flags))?;
        debug!(workspace, status_uri = %response.uri, "partial import started");
        Ok(TaskHandle::import(response.uri))
    }

    /// Deletes objects by URI.
    ///
    /// Each object is deleted with its own request. A failure is logged and
    /// recorded in the report; the remaining deletions still run. Only a
    /// missing session token aborts the batch.
    pub fn delete_objects(&self, workspace: &str, uris: &[String]) -> EngineResult<DeleteReport> {
        let headers = self.session.headers()?;
        let mut report = DeleteReport::default();

        for uri in uris {
            let outcome = self
                .session
                .client()
                .delete(&self.session.url(uri), &headers)
                .map_err(EngineError::transport)
                .and_then(|response| match response.status {
                    204 => Ok(()),
                    status => Err(EngineError::Api {
                        status,
                        body: response.body,
                    }),
                });

            match outcome {
                Ok(()) => {
                    debug!(workspace, uri = %uri, "object deleted");
                    report.deleted.push(uri.clone());
                }
                Err(e) => {
                    warn!(workspace, uri = %uri, error = %e, "object not deleted");
                    report.failed.push((uri.clone(), e));
                }
            }
        }

        Ok(report)
    }

    /// Checks the status of a task.
    pub fn task_status(&self, handle: &TaskHandle) -> EngineResult<TaskStateResponse> {
        self.get_json(&handle.status_uri)
    }

    fn get(&self, path: &str) -> EngineResult<HttpResponse> {
        let headers = self.session.headers()?;
        let response = self
            .session
            .client()
            .get(&self.session.url(path), &headers)
            .map_err(EngineError::transport)?;
        expect_success(response)
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> EngineResult<T> {
        let response = self.get(path)?;
        Ok(decode(&response.body)?)
    }

    fn post_json<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> EngineResult<T> {
        let headers = self.session.headers()?;
        let body = encode(body)?;
        let response = self
            .session
            .client()
            .post(&self.session.url(path), &headers, Some(&body))
            .map_err(EngineError::transport)?;
        let response = expect_success(response)?;
        Ok(decode(&response.body)?)
    }
}

fn metrics_path(workspace: &str) -> String {
    format!("/gdc/md/{workspace}/query/metrics")
}

fn expect_success(response: HttpResponse) -> EngineResult<HttpResponse> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(EngineError::Api {
            status: response.status,
            body: response.body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::session::Credentials;
    use crate::transport::{Method, MockHttpClient};
    use poupon_protocol::TaskStatus;

    fn client() -> ResourceClient<MockHttpClient> {
        let session = Session::new(
            ClientConfig::new("https://acme.example.com"),
            MockHttpClient::new(),
        );
        session
            .client()
            .push_response(200, r#"{"userToken": {"token": "tt"}}"#);
        session.authenticate(&Credentials::secret("sst")).unwrap();
        ResourceClient::new(session)
    }

    fn mock(client: &ResourceClient<MockHttpClient>) -> &MockHttpClient {
        client.session().client()
    }

    #[test]
    fn calls_fail_fast_without_session() {
        let session = Session::new(
            ClientConfig::new("https://acme.example.com"),
            MockHttpClient::new(),
        );
        let client = ResourceClient::new(session);
        assert!(matches!(
            client.project_info("p1"),
            Err(EngineError::NotAuthenticated)
        ));
        assert!(matches!(
            client.delete_objects("p1", &["/gdc/md/p1/obj/1".into()]),
            Err(EngineError::NotAuthenticated)
        ));
        assert_eq!(client.session().client().request_count(), 0);
    }

    #[test]
    fn list_metrics_filters_category() {
        let client = client();
        mock(&client).push_response(
            200,
            r#"{"query": {"entries": [
                {"identifier": "m1", "link": "/gdc/md/p1/obj/1", "tags": "kpi", "category": "metric"},
                {"identifier": "r1", "link": "/gdc/md/p1/obj/2", "tags": "kpi", "category": "report"}
            ]}}"#,
        );

        let metrics: Vec<Metric> = client.list_metrics("p1").unwrap().collect();
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].identifier, "m1");

        let request = &mock(&client).requests()[1];
        assert_eq!(request.url, "https://acme.example.com/gdc/md/p1/query/metrics");
        assert_eq!(request.header("Cookie"), Some("GDCAuthTT=tt"));
    }

    #[test]
    fn non_success_is_api_error() {
        let client = client();
        mock(&client).push_response(403, "forbidden");

        match client.list_metrics("p1") {
            Err(EngineError::Api { status, body }) => {
                assert_eq!(status, 403);
                assert_eq!(body, "forbidden");
            }
            Err(other) => panic!("expected api error, got {other:?}"),
            Ok(_) => panic!("expected api error"),
        }
    }

    #[test]
    fn export_and_import_project() {
        let client = client();
        mock(&client)
            .push_response(
                200,
                r#"{"exportArtifact": {"status": {"uri": "/gdc/md/p1/tasks/9/status"}, "token": "xfer"}}"#,
            )
            .push_response(200, r#"{"uri": "/gdc/md/p2/tasks/10/status"}"#);

        let export = client
            .export_project("p1", ExportProjectFlags::default())
            .unwrap();
        assert_eq!(export.transfer_token.as_deref(), Some("xfer"));

        let import = client.import_project("p2", "xfer").unwrap();
        assert_eq!(import.status_uri, "/gdc/md/p2/tasks/10/status");
        assert!(import.transfer_token.is_none());

        let requests = mock(&client).requests();
        assert_eq!(
            requests[1].url,
            "https://acme.example.com/gdc/md/p1/maintenance/export"
        );
        assert_eq!(requests[2].json().unwrap()["importProject"]["token"], "xfer");
    }

    #[test]
    fn create_project_returns_last_segment() {
        let client = client();
        mock(&client).push_response(201, r#"{"uri": "/gdc/projects/newpid42"}"#);

        let id = client
            .create_project("auth", "Backup", None, "Pg", Environment::Production)
            .unwrap();
        assert_eq!(id, "newpid42");

        let body = mock(&client).requests()[1].json().unwrap();
        assert_eq!(body["project"]["content"]["environment"], "PRODUCTION");
    }

    #[test]
    fn project_info_and_state() {
        let client = client();
        let body = r#"{"project": {"content": {"environment": "TESTING", "state": "PREPARING"}, "meta": {"title": "Sales"}}}"#;
        mock(&client).push_response(200, body).push_response(200, body);

        let info = client.project_info("p1").unwrap();
        assert_eq!(info.title, "Sales");
        assert_eq!(info.environment, Environment::Testing);
        assert_eq!(client.project_state("p1").unwrap(), ProjectState::Preparing);
        assert_eq!(mock(&client).requests()[1].method, Method::Get);
    }

    #[test]
    fn partial_export_and_import() {
        let client = client();
        mock(&client)
            .push_response(
                200,
                r#"{"partialMDArtifact": {"status": {"uri": "/gdc/md/p1/tasks/3/status"}, "token": "part"}}"#,
            )
            .push_response(200, r#"{"uri": "/gdc/md/p2/tasks/4/status"}"#);

        let uris = vec!["/gdc/md/p1/obj/1".to_string(), "/gdc/md/p1/obj/2".to_string()];
        let export = client
            .export_objects("p1", &uris, ExportObjectsFlags::default())
            .unwrap();
        assert_eq!(export.transfer_token.as_deref(), Some("part"));

        client
            .import_objects("p2", "part", ImportObjectsFlags::default())
            .unwrap();

        let requests = mock(&client).requests();
        assert_eq!(
            requests[1].json().unwrap()["partialMDExport"]["uris"]
                .as_array()
                .unwrap()
                .len(),
            2
        );
        assert_eq!(
            requests[2].url,
            "https://acme.example.com/gdc/md/p2/maintenance/partialmdimport"
        );
    }

    #[test]
    fn delete_objects_tolerates_failures() {
        let client = client();
        mock(&client)
            .push_response(204, "")
            .push_response(404, "gone")
            .push_error("reset")
            .push_response(204, "");

        let uris: Vec<String> = (1..=4).map(|n| format!("/gdc/md/p1/obj/{n}")).collect();
        let report = client.delete_objects("p1", &uris).unwrap();

        assert_eq!(report.deleted, vec![uris[0].clone(), uris[3].clone()]);
        assert_eq!(report.failed.len(), 2);
        assert!(matches!(report.failed[0].1, EngineError::Api { status: 404, .. }));
        assert!(matches!(report.failed[1].1, EngineError::Transport { .. }));
        assert!(!report.is_complete());

        let requests = mock(&client).requests();
        assert_eq!(requests.len(), 5);
        assert!(requests[1..].iter().all(|r| r.method == Method::Delete));
        assert_eq!(requests[4].url, "https://acme.example.com/gdc/md/p1/obj/4");
    }

    #[test]
    fn task_status_uses_handle_uri() {
        let client = client();
        mock(&client).push_response(200, r#"{"taskState": {"status": "OK", "msg": "done"}}"#);

        let handle = TaskHandle::import("/gdc/md/p1/tasks/5/status");
        let state = client.task_status(&handle).unwrap();
        assert_eq!(state.status(), TaskStatus::Ok);
        assert_eq!(
            mock(&client).requests()[1].url,
            "https://acme.example.com/gdc/md/p1/tasks/5/status"
        );
    }

    #[test]
    fn download_metrics_writes_raw_document() {
        let client = client();
        let body = r#"{"query": {"entries": [{"identifier": "r", "link": "/l", "category": "report"}]}}"#;
        mock(&client).push_response(200, body);

        let mut out = Vec::new();
        client.download_metrics("p1", &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), body);
    }
}
