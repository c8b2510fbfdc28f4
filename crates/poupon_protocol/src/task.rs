//! Asynchronous export/import task payloads.
//!
//! Export calls answer with a status URI and a transfer token; import calls
//! answer with a status URI only. The status URI is then polled until the
//! task reaches a terminal state.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reference to an in-flight server task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskHandle {
    /// Status-check URI, relative to the platform base URL.
    pub status_uri: String,
    /// Transfer token for the matching import (exports only).
    pub transfer_token: Option<String>,
}

impl TaskHandle {
    /// Creates a handle for an export task.
    pub fn export(status_uri: impl Into<String>, transfer_token: impl Into<String>) -> Self {
        Self {
            status_uri: status_uri.into(),
            transfer_token: Some(transfer_token.into()),
        }
    }

    /// Creates a handle for an import task.
    pub fn import(status_uri: impl Into<String>) -> Self {
        Self {
            status_uri: status_uri.into(),
            transfer_token: None,
        }
    }
}

/// Status of a polled task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    /// Finished successfully.
    Ok,
    /// Still running; carries the raw status.
    InProgress(String),
    /// Reported failure; carries the raw status.
    Failed(String),
}

impl TaskStatus {
    /// Classifies a raw status string.
    ///
    /// Only `OK` is success. Known in-flight statuses keep the task pending;
    /// everything else is treated as an explicit failure.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "OK" => TaskStatus::Ok,
            "RUNNING" | "PENDING" | "PREPARING" | "QUEUED" | "SCHEDULED" | "WAITING"
            | "IN_PROGRESS" => TaskStatus::InProgress(raw.to_string()),
            _ => TaskStatus::Failed(raw.to_string()),
        }
    }

    /// Returns true if the task will not change status again.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::InProgress(_))
    }

    /// Returns the raw status.
    pub fn as_str(&self) -> &str {
        match self {
            TaskStatus::Ok => "OK",
            TaskStatus::InProgress(s) | TaskStatus::Failed(s) => s,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response of a status-check URI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStateResponse {
    /// Task state envelope.
    #[serde(rename = "taskState")]
    pub task_state: TaskState,
}

/// Inner `taskState` object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskState {
    /// Raw status string.
    pub status: String,
    /// Progress or error message.
    #[serde(default)]
    pub msg: Option<String>,
}

impl TaskStateResponse {
    /// Creates a task state response.
    pub fn new(status: impl Into<String>, msg: Option<String>) -> Self {
        Self {
            task_state: TaskState {
                status: status.into(),
                msg,
            },
        }
    }

    /// Classified status.
    pub fn status(&self) -> TaskStatus {
        TaskStatus::parse(&self.task_state.status)
    }

    /// Server message, if any.
    pub fn message(&self) -> Option<&str> {
        self.task_state.msg.as_deref()
    }
}

/// Options of a full workspace export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportProjectFlags {
    /// Export users and their roles.
    pub include_users: bool,
    /// Export loaded data, not just the model.
    pub include_data: bool,
    /// Leave scheduled processes out of the export.
    pub exclude_schedules: bool,
    /// Allow importing the result in another data center.
    pub cross_data_center_export: bool,
}

/// Body of `POST /gdc/md/<workspace>/maintenance/export`.
#[derive(Debug, Clone, Serialize)]
pub struct ExportProjectRequest {
    #[serde(rename = "exportProject")]
    export_project: ExportProjectFields,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportProjectFields {
    export_users: u8,
    export_data: u8,
    exclude_schedules: u8,
    cross_data_center_export: u8,
}

impl From<ExportProjectFlags> for ExportProjectRequest {
    fn from(flags: ExportProjectFlags) -> Self {
        Self {
            export_project: ExportProjectFields {
                export_users: u8::from(flags.include_users),
                export_data: u8::from(flags.include_data),
                exclude_schedules: u8::from(flags.exclude_schedules),
                cross_data_center_export: u8::from(flags.cross_data_center_export),
            },
        }
    }
}

/// Body of `POST /gdc/md/<workspace>/maintenance/import`.
#[derive(Debug, Clone, Serialize)]
pub struct ImportProjectRequest<'a> {
    #[serde(rename = "importProject")]
    import_project: TokenOnly<'a>,
}

#[derive(Debug, Clone, Serialize)]
struct TokenOnly<'a> {
    token: &'a str,
}

impl<'a> ImportProjectRequest<'a> {
    /// Creates a full import request for a transfer token.
    pub fn new(token: &'a str) -> Self {
        Self {
            import_project: TokenOnly { token },
        }
    }
}

/// Options of a partial (object set) export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportObjectsFlags {
    /// Include drill-down attribute settings and label types.
    pub export_attribute_properties: bool,
    /// Allow importing the result in another data center.
    pub cross_data_center_export: bool,
}

impl Default for ExportObjectsFlags {
    fn default() -> Self {
        Self {
            export_attribute_properties: true,
            cross_data_center_export: false,
        }
    }
}

/// Body of `POST /gdc/md/<workspace>/maintenance/partialmdexport`.
#[derive(Debug, Clone, Serialize)]
pub struct ExportObjectsRequest<'a> {
    #[serde(rename = "partialMDExport")]
    partial_md_export: ExportObjectsFields<'a>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportObjectsFields<'a> {
    uris: &'a [String],
    export_attribute_properties: bool,
    cross_data_center_export: bool,
}

impl<'a> ExportObjectsRequest<'a> {
    /// Creates a partial export request for the given object URIs.
    pub fn new(uris: &'a [String], flags: ExportObjectsFlags) -> Self {
        Self {
            partial_md_export: ExportObjectsFields {
                uris,
                export_attribute_properties: flags.export_attribute_properties,
                cross_data_center_export: flags.cross_data_center_export,
            },
        }
    }
}

/// Options of a partial (object set) import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportObjectsFlags {
    /// Overwrite objects even if the target copy is newer.
    pub overwrite_newer: bool,
    /// Update logical data model objects as well.
    pub update_ldm_objects: bool,
    /// Import drill-down attribute settings and label types.
    pub import_attribute_properties: bool,
}

impl Default for ImportObjectsFlags {
    fn default() -> Self {
        Self {
            overwrite_newer: true,
            update_ldm_objects: true,
            import_attribute_properties: true,
        }
    }
}

/// Body of `POST /gdc/md/<workspace>/maintenance/partialmdimport`.
#[derive(Debug, Clone, Serialize)]
pub struct ImportObjectsRequest<'a> {
    #[serde(rename = "partialMDImport")]
    partial_md_import: ImportObjectsFields<'a>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImportObjectsFields<'a> {
    token: &'a str,
    overwrite_newer: bool,
    #[serde(rename = "updateLDMObjects")]
    update_ldm_objects: bool,
    import_attribute_properties: bool,
}

impl<'a> ImportObjectsRequest<'a> {
    /// Creates a partial import request for a transfer token.
    pub fn new(token: &'a str, flags: ImportObjectsFlags) -> Self {
        Self {
            partial_md_import: ImportObjectsFields {
                token,
                overwrite_newer: flags.overwrite_newer,
                update_ldm_objects: flags.update_ldm_objects,
                import_attribute_properties: flags.import_attribute_properties,
            },
        }
    }
}

/// Response of a full or partial export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExportResponse {
    /// Full workspace export artifact.
    #[serde(rename = "exportArtifact")]
    Project(Artifact),
    /// Partial (object set) export artifact.
    #[serde(rename = "partialMDArtifact")]
    Objects(Artifact),
}

/// Export artifact: where to poll, and what to import.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    /// Status link.
    pub status: StatusLink,
    /// Transfer token.
    pub token: String,
}

/// Link to a status-check resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusLink {
    /// Status-check URI.
    pub uri: String,
}

impl ExportResponse {
    /// Builds the artifact envelope around a status URI and token.
    pub fn artifact(status_uri: impl Into<String>, token: impl Into<String>) -> Artifact {
        Artifact {
            status: StatusLink {
                uri: status_uri.into(),
            },
            token: token.into(),
        }
    }

    /// Converts the response into a task handle.
    pub fn into_handle(self) -> TaskHandle {
        let artifact = match self {
            ExportResponse::Project(a) | ExportResponse::Objects(a) => a,
        };
        TaskHandle::export(artifact.status.uri, artifact.token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{decode, encode};
    use serde_json::Value;

    fn to_value<T: Serialize>(value: &T) -> Value {
        serde_json::from_str(&encode(value).unwrap()).unwrap()
    }

    #[test]
    fn status_classification() {
        assert_eq!(TaskStatus::parse("OK"), TaskStatus::Ok);
        assert_eq!(
            TaskStatus::parse("RUNNING"),
            TaskStatus::InProgress("RUNNING".into())
        );
        assert_eq!(TaskStatus::parse("ERROR"), TaskStatus::Failed("ERROR".into()));
        assert_eq!(
            TaskStatus::parse("SOMETHING_NEW"),
            TaskStatus::Failed("SOMETHING_NEW".into())
        );
        assert!(TaskStatus::Ok.is_terminal());
        assert!(!TaskStatus::parse("PENDING").is_terminal());
        assert!(TaskStatus::parse("ERROR").is_terminal());
    }

    #[test]
    fn export_project_flags_are_integers() {
        let request = ExportProjectRequest::from(ExportProjectFlags {
            include_users: true,
            include_data: false,
            exclude_schedules: true,
            cross_data_center_export: false,
        });
        let value = to_value(&request);
        let fields = &value["exportProject"];
        assert_eq!(fields["exportUsers"], 1);
        assert_eq!(fields["exportData"], 0);
        assert_eq!(fields["excludeSchedules"], 1);
        assert_eq!(fields["crossDataCenterExport"], 0);
    }

    #[test]
    fn partial_requests_field_names() {
        let uris = vec!["/gdc/md/p/obj/1".to_string()];
        let value = to_value(&ExportObjectsRequest::new(&uris, ExportObjectsFlags::default()));
        assert_eq!(value["partialMDExport"]["uris"][0], "/gdc/md/p/obj/1");
        assert_eq!(value["partialMDExport"]["exportAttributeProperties"], true);
        assert_eq!(value["partialMDExport"]["crossDataCenterExport"], false);

        let value = to_value(&ImportObjectsRequest::new(
            "tok",
            ImportObjectsFlags::default(),
        ));
        let fields = &value["partialMDImport"];
        assert_eq!(fields["token"], "tok");
        assert_eq!(fields["overwriteNewer"], true);
        assert_eq!(fields["updateLDMObjects"], true);
        assert_eq!(fields["importAttributeProperties"], true);

        let value = to_value(&ImportProjectRequest::new("tok"));
        assert_eq!(value["importProject"]["token"], "tok");
    }

    #[test]
    fn export_responses_become_handles() {
        let body = r#"{"exportArtifact": {"status": {"uri": "/gdc/md/p/tasks/1/status"}, "token": "t1"}}"#;
        let handle = decode::<ExportResponse>(body).unwrap().into_handle();
        assert_eq!(handle, TaskHandle::export("/gdc/md/p/tasks/1/status", "t1"));

        let body = r#"{"partialMDArtifact": {"status": {"uri": "/gdc/md/p/tasks/2/status"}, "token": "t2"}}"#;
        let handle = decode::<ExportResponse>(body).unwrap().into_handle();
        assert_eq!(handle.transfer_token.as_deref(), Some("t2"));
    }

    #[test]
    fn task_state_message() {
        let state: TaskStateResponse =
            decode(r#"{"taskState": {"status": "RUNNING", "msg": "exporting"}}"#).unwrap();
        assert_eq!(state.status(), TaskStatus::InProgress("RUNNING".into()));
        assert_eq!(state.message(), Some("exporting"));
    }
}
