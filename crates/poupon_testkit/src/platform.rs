//! In-memory fake of the platform's REST API.
//!
//! [`FakePlatform`] implements the engine's HTTP transport trait and
//! answers the endpoints the client uses: credential exchange, metric
//! listing, full and partial export/import, workspace creation and
//! lookup, task status and object deletion. Export and import effects
//! are applied immediately; task status checks replay a configurable
//! script before reporting the task's final status.

use parking_lot::Mutex;
use poupon_engine::{
    ClientConfig, EngineResult, Headers, HttpClient, HttpResponse, Method, RecordedRequest,
    Session,
};
use poupon_protocol::{
    Environment, ExportResponse, Metric, MetricsQuery, ProjectEnvelope, ProjectInfo,
    ProjectState, SST_HEADER, TT_COOKIE,
};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

/// Base URL sessions over the fake platform use.
pub const FAKE_BASE_URL: &str = "https://fake.analytics.test";

#[derive(Debug, Clone)]
struct FakeWorkspace {
    title: String,
    environment: Environment,
    bootstrap: VecDeque<ProjectState>,
    metrics: Vec<Metric>,
}

#[derive(Debug, Clone)]
enum Payload {
    Project(Vec<Metric>),
    Objects(Vec<Metric>),
}

#[derive(Debug)]
struct Task {
    script: VecDeque<String>,
    final_status: String,
}

#[derive(Debug, Default)]
struct PlatformState {
    users: BTreeMap<String, (String, String)>,
    secrets: BTreeSet<String>,
    short_lived: BTreeSet<String>,
    rate_limited: Option<u64>,
    offline: bool,
    workspaces: BTreeMap<String, FakeWorkspace>,
    payloads: BTreeMap<String, Payload>,
    tasks: BTreeMap<String, Task>,
    task_script: Vec<String>,
    next_task_failure: Option<String>,
    bootstrap: Vec<ProjectState>,
    failing_deletes: BTreeSet<String>,
    next_id: u64,
    requests: Vec<RecordedRequest>,
}

/// An in-memory platform.
#[derive(Debug)]
pub struct FakePlatform {
    state: Mutex<PlatformState>,
}

impl FakePlatform {
    /// Creates an empty platform.
    ///
    /// New tasks report `RUNNING` once before `OK`; new workspaces report
    /// `PREPARING` once before `ENABLED`.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PlatformState {
                task_script: vec!["RUNNING".to_string()],
                bootstrap: vec![ProjectState::Preparing],
                ..PlatformState::default()
            }),
        }
    }

    /// Creates an empty platform behind an [`Arc`].
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Connection settings pointing at the fake.
    pub fn config() -> ClientConfig {
        ClientConfig::new(FAKE_BASE_URL)
    }

    /// Opens a session authenticated with a long-lived secret.
    pub fn session(self: &Arc<Self>, secret: &str) -> EngineResult<Session<Arc<FakePlatform>>> {
        Session::with_secret(Self::config(), Arc::clone(self), secret)
    }

    /// Registers a user and the secret their login yields.
    pub fn with_user(&self, login: &str, password: &str, secret: &str) -> &Self {
        let mut state = self.state.lock();
        state
            .users
            .insert(login.to_string(), (password.to_string(), secret.to_string()));
        state.secrets.insert(secret.to_string());
        drop(state);
        self
    }

    /// Registers a valid long-lived secret.
    pub fn with_secret(&self, secret: &str) -> &Self {
        self.state.lock().secrets.insert(secret.to_string());
        self
    }

    /// Adds an enabled workspace.
    pub fn add_workspace(&self, id: &str, title: &str, environment: Environment) -> &Self {
        self.state.lock().workspaces.insert(
            id.to_string(),
            FakeWorkspace {
                title: title.to_string(),
                environment,
                bootstrap: VecDeque::new(),
                metrics: Vec::new(),
            },
        );
        self
    }

    /// Adds a metric to a workspace and returns its object URI.
    ///
    /// # Panics
    ///
    /// Panics if the workspace does not exist.
    pub fn add_metric(&self, workspace: &str, identifier: &str, tags: &str) -> String {
        let mut state = self.state.lock();
        let link = state.next_link(workspace);
        state
            .workspace_mut(workspace)
            .metrics
            .push(Metric::new(identifier, link.clone(), tags));
        link
    }

    /// Adds a raw query entry to a workspace.
    ///
    /// # Panics
    ///
    /// Panics if the workspace does not exist.
    pub fn add_entry(&self, workspace: &str, entry: Metric) {
        self.state.lock().workspace_mut(workspace).metrics.push(entry);
    }

    /// Current entries of a workspace, empty if it does not exist.
    pub fn metrics(&self, workspace: &str) -> Vec<Metric> {
        self.state
            .lock()
            .workspaces
            .get(workspace)
            .map(|w| w.metrics.clone())
            .unwrap_or_default()
    }

    /// Looks up a workspace entry by identifier.
    pub fn metric(&self, workspace: &str, identifier: &str) -> Option<Metric> {
        self.metrics(workspace)
            .into_iter()
            .find(|m| m.identifier == identifier)
    }

    /// Sorted identifiers of a workspace's entries carrying `tag`.
    pub fn tagged(&self, workspace: &str, tag: &str) -> Vec<String> {
        let mut ids: Vec<String> = self
            .metrics(workspace)
            .into_iter()
            .filter(|m| m.has_tag(tag))
            .map(|m| m.identifier)
            .collect();
        ids.sort();
        ids
    }

    /// Ids of all workspaces.
    pub fn workspace_ids(&self) -> Vec<String> {
        self.state.lock().workspaces.keys().cloned().collect()
    }

    /// Title and environment of a workspace.
    pub fn workspace(&self, id: &str) -> Option<(String, Environment)> {
        self.state
            .lock()
            .workspaces
            .get(id)
            .map(|w| (w.title.clone(), w.environment))
    }

    /// Sets the statuses every new task reports before its final status.
    pub fn set_task_script(&self, statuses: &[&str]) {
        self.state.lock().task_script = statuses.iter().map(|s| s.to_string()).collect();
    }

    /// Makes the next created task end with `status` instead of `OK`.
    pub fn fail_next_task(&self, status: &str) {
        self.state.lock().next_task_failure = Some(status.to_string());
    }

    /// Sets the states a newly created workspace reports before `ENABLED`.
    pub fn set_bootstrap_states(&self, states: Vec<ProjectState>) {
        self.state.lock().bootstrap = states;
    }

    /// Answers credential exchanges with 429, optionally with Retry-After.
    pub fn set_rate_limited(&self, retry_after: Option<u64>) {
        self.state.lock().rate_limited = Some(retry_after.unwrap_or(0));
    }

    /// Makes deletion of `uri` fail with a server error.
    pub fn fail_delete(&self, uri: &str) {
        self.state.lock().failing_deletes.insert(uri.to_string());
    }

    /// Fails every request at the transport level.
    pub fn set_offline(&self, offline: bool) {
        self.state.lock().offline = offline;
    }

    /// All requests received, in order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().requests.clone()
    }

    /// Number of requests with `method` whose URL ends with `suffix`.
    pub fn count(&self, method: Method, suffix: &str) -> usize {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|r| r.method == method && r.url.ends_with(suffix))
            .count()
    }

    fn handle(
        &self,
        method: Method,
        url: &str,
        headers: &Headers,
        body: Option<&str>,
    ) -> Result<HttpResponse, String> {
        let mut state = self.state.lock();
        state.requests.push(RecordedRequest {
            method,
            url: url.to_string(),
            headers: headers.clone(),
            body: body.map(str::to_string),
        });
        if state.offline {
            return Err(format!("connection refused: {url}"));
        }

        let path = path_of(url);
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
        let body = body.and_then(|b| serde_json::from_str::<Value>(b).ok());

        let response = match (method, segments.as_slice()) {
            (Method::Post, ["gdc", "account", "login"]) => state.login(body),
            (Method::Get, ["gdc", "account", "token"]) => state.token(header(headers, SST_HEADER)),
            _ if !state.authorized(headers) => HttpResponse::new(401, "unauthorized"),
            (Method::Get, ["gdc", "md", ws, "query", "metrics"]) => state.list_metrics(ws),
            (Method::Post, ["gdc", "md", ws, "maintenance", "export"]) => state.export_project(ws),
            (Method::Post, ["gdc", "md", ws, "maintenance", "import"]) => {
                state.import(ws, body, "importProject")
            }
            (Method::Post, ["gdc", "md", ws, "maintenance", "partialmdexport"]) => {
                state.export_objects(ws, body)
            }
            (Method::Post, ["gdc", "md", ws, "maintenance", "partialmdimport"]) => {
                state.import(ws, body, "partialMDImport")
            }
            (Method::Get, ["gdc", "md", _, "tasks", _, "status"]) => state.task_status(path),
            (Method::Post, ["gdc", "projects"]) => state.create_project(body),
            (Method::Get, ["gdc", "projects", id]) => state.project(id),
            (Method::Delete, ["gdc", "md", _, "obj", _]) => state.delete(path),
            _ => HttpResponse::new(404, format!("no route for {method:?} {path}")),
        };
        Ok(response)
    }
}

impl Default for FakePlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient for FakePlatform {
    fn get(&self, url: &str, headers: &Headers) -> Result<HttpResponse, String> {
        self.handle(Method::Get, url, headers, None)
    }

    fn post(&self, url: &str, headers: &Headers, body: Option<&str>) -> Result<HttpResponse, String> {
        self.handle(Method::Post, url, headers, body)
    }

    fn delete(&self, url: &str, headers: &Headers) -> Result<HttpResponse, String> {
        self.handle(Method::Delete, url, headers, None)
    }
}

impl PlatformState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn next_link(&mut self, workspace: &str) -> String {
        format!("/gdc/md/{workspace}/obj/{}", self.next_id())
    }

    fn workspace_mut(&mut self, id: &str) -> &mut FakeWorkspace {
        self.workspaces
            .get_mut(id)
            .unwrap_or_else(|| panic!("unknown fake workspace {id}"))
    }

    fn rate_limit(&self) -> Option<HttpResponse> {
        self.rate_limited.map(|secs| {
            let response = HttpResponse::new(429, "too many requests");
            if secs > 0 {
                response.with_header("Retry-After", secs.to_string())
            } else {
                response
            }
        })
    }

    fn login(&mut self, body: Option<Value>) -> HttpResponse {
        if let Some(limited) = self.rate_limit() {
            return limited;
        }
        let fields = body.as_ref().map(|b| &b["postUserLogin"]);
        let login = fields.and_then(|f| f["login"].as_str()).unwrap_or_default();
        let password = fields.and_then(|f| f["password"].as_str()).unwrap_or_default();

        match self.users.get(login) {
            Some((expected, secret)) if expected == password => ok_json(&json!({
                "userLogin": {"token": secret, "profile": "/gdc/account/profile/1"}
            })),
            _ => HttpResponse::new(401, "invalid login"),
        }
    }

    fn token(&mut self, secret: Option<&str>) -> HttpResponse {
        if let Some(limited) = self.rate_limit() {
            return limited;
        }
        match secret {
            Some(secret) if self.secrets.contains(secret) => {
                let token = format!("tt-{}", self.next_id());
                self.short_lived.insert(token.clone());
                ok_json(&json!({"userToken": {"token": token}}))
            }
            _ => HttpResponse::new(401, "invalid secret"),
        }
    }

    fn authorized(&self, headers: &Headers) -> bool {
        let prefix = format!("{TT_COOKIE}=");
        header(headers, "Cookie")
            .and_then(|c| c.strip_prefix(prefix.as_str()))
            .is_some_and(|tt| self.short_lived.contains(tt))
    }

    fn list_metrics(&self, workspace: &str) -> HttpResponse {
        match self.workspaces.get(workspace) {
            Some(w) => ok_json(&MetricsQuery::from_entries(w.metrics.clone())),
            None => not_found(workspace),
        }
    }

    fn new_task(&mut self, workspace: &str) -> String {
        let uri = format!("/gdc/md/{workspace}/tasks/{}/status", self.next_id());
        let task = Task {
            script: self.task_script.iter().cloned().collect(),
            final_status: self
                .next_task_failure
                .take()
                .unwrap_or_else(|| "OK".to_string()),
        };
        self.tasks.insert(uri.clone(), task);
        uri
    }

    fn export_project(&mut self, workspace: &str) -> HttpResponse {
        let Some(metrics) = self.workspaces.get(workspace).map(|w| w.metrics.clone()) else {
            return not_found(workspace);
        };
        let status = self.new_task(workspace);
        let token = format!("xfer-{}", self.next_id());
        self.payloads.insert(token.clone(), Payload::Project(metrics));
        ok_json(&ExportResponse::Project(ExportResponse::artifact(status, token)))
    }

    fn export_objects(&mut self, workspace: &str, body: Option<Value>) -> HttpResponse {
        let Some(source) = self.workspaces.get(workspace) else {
            return not_found(workspace);
        };
        let uris: Vec<String> = body
            .as_ref()
            .and_then(|b| b["partialMDExport"]["uris"].as_array())
            .map(|a| a.iter().filter_map(|u| u.as_str().map(str::to_string)).collect())
            .unwrap_or_default();

        let mut picked = Vec::with_capacity(uris.len());
        for uri in &uris {
            match source.metrics.iter().find(|m| &m.link == uri) {
                Some(m) => picked.push(m.clone()),
                None => return HttpResponse::new(400, format!("object {uri} not in {workspace}")),
            }
        }

        let status = self.new_task(workspace);
        let token = format!("part-{}", self.next_id());
        self.payloads.insert(token.clone(), Payload::Objects(picked));
        ok_json(&ExportResponse::Objects(ExportResponse::artifact(status, token)))
    }

    fn import(&mut self, workspace: &str, body: Option<Value>, envelope: &str) -> HttpResponse {
        if !self.workspaces.contains_key(workspace) {
            return not_found(workspace);
        }
        let token = body
            .as_ref()
            .and_then(|b| b[envelope]["token"].as_str())
            .unwrap_or_default()
            .to_string();

        match (envelope, self.payloads.get(&token).cloned()) {
            ("importProject", Some(Payload::Project(metrics))) => {
                let relinked: Vec<Metric> = metrics
                    .into_iter()
                    .map(|m| Metric {
                        link: self.next_link(workspace),
                        ..m
                    })
                    .collect();
                self.workspace_mut(workspace).metrics = relinked;
            }
            ("partialMDImport", Some(Payload::Objects(metrics))) => {
                for incoming in metrics {
                    let link = self.next_link(workspace);
                    let target = self.workspace_mut(workspace);
                    match target
                        .metrics
                        .iter()
                        .position(|m| m.identifier == incoming.identifier)
                    {
                        Some(pos) => {
                            let existing = &mut target.metrics[pos];
                            existing.tags = incoming.tags;
                            existing.title = incoming.title;
                            existing.category = incoming.category;
                        }
                        None => target.metrics.push(Metric { link, ..incoming }),
                    }
                }
            }
            _ => return HttpResponse::new(400, format!("invalid transfer token {token:?}")),
        }

        let status = self.new_task(workspace);
        ok_json(&json!({ "uri": status }))
    }

    fn task_status(&mut self, uri: &str) -> HttpResponse {
        match self.tasks.get_mut(uri) {
            Some(task) => {
                let status = task
                    .script
                    .pop_front()
                    .unwrap_or_else(|| task.final_status.clone());
                ok_json(&json!({"taskState": {"status": status, "msg": format!("task is {status}")}}))
            }
            None => not_found(uri),
        }
    }

    fn create_project(&mut self, body: Option<Value>) -> HttpResponse {
        let Some(project) = body.as_ref().map(|b| &b["project"]) else {
            return HttpResponse::new(400, "missing body");
        };
        let authorized = project["content"]["authorizationToken"]
            .as_str()
            .is_some_and(|t| !t.is_empty());
        if !authorized {
            return HttpResponse::new(403, "missing authorization token");
        }
        let title = project["meta"]["title"].as_str().unwrap_or_default().to_string();
        let environment =
            serde_json::from_value(project["content"]["environment"].clone()).unwrap_or_default();

        let id = format!("ws{}", self.next_id());
        self.workspaces.insert(
            id.clone(),
            FakeWorkspace {
                title,
                environment,
                bootstrap: self.bootstrap.iter().cloned().collect(),
                metrics: Vec::new(),
            },
        );
        json_response(201, &json!({ "uri": format!("/gdc/projects/{id}") }))
    }

    fn project(&mut self, id: &str) -> HttpResponse {
        let Some(workspace) = self.workspaces.get_mut(id) else {
            return not_found(id);
        };
        let state = workspace
            .bootstrap
            .pop_front()
            .unwrap_or(ProjectState::Enabled);
        ok_json(&ProjectEnvelope::new(&ProjectInfo {
            title: workspace.title.clone(),
            summary: None,
            environment: workspace.environment,
            state,
        }))
    }

    fn delete(&mut self, uri: &str) -> HttpResponse {
        if self.failing_deletes.contains(uri) {
            return HttpResponse::new(500, "delete failed");
        }
        for workspace in self.workspaces.values_mut() {
            if let Some(pos) = workspace.metrics.iter().position(|m| m.link == uri) {
                workspace.metrics.remove(pos);
                return HttpResponse::new(204, "");
            }
        }
        not_found(uri)
    }
}

fn path_of(url: &str) -> &str {
    url.find("/gdc").map_or(url, |i| &url[i..])
}

fn header<'a>(headers: &'a Headers, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

fn json_response<T: serde::Serialize>(status: u16, value: &T) -> HttpResponse {
    HttpResponse::new(
        status,
        serde_json::to_string(value).expect("fake responses serialize"),
    )
    .with_header("Content-Type", "application/json")
}

fn ok_json<T: serde::Serialize>(value: &T) -> HttpResponse {
    json_response(200, value)
}

fn not_found(what: &str) -> HttpResponse {
    HttpResponse::new(404, format!("{what} not found"))
}
