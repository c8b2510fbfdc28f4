//! Workspace (project) payloads.

use crate::error::{ProtocolError, ProtocolResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Database driver used when none is requested.
pub const DEFAULT_DRIVER: &str = "Pg";

/// Lifecycle environment of a workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Environment {
    /// Production workspace.
    Production,
    /// Development workspace.
    #[default]
    Development,
    /// Testing workspace.
    Testing,
}

impl Environment {
    /// Returns the wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Production => "PRODUCTION",
            Environment::Development => "DEVELOPMENT",
            Environment::Testing => "TESTING",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bootstrap state of a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProjectState {
    /// Still being provisioned.
    Preparing,
    /// Provisioned, loading initial content.
    Loading,
    /// Ready for use.
    Enabled,
    /// Disabled by an administrator.
    Disabled,
    /// Deleted.
    Deleted,
    /// Archived.
    Archived,
    /// Any state this client does not know about.
    Other(String),
}

impl ProjectState {
    /// Returns true once the workspace accepts imports.
    pub fn is_enabled(&self) -> bool {
        matches!(self, ProjectState::Enabled)
    }

    /// Returns true for states a workspace never leaves on its own.
    pub fn is_dead_end(&self) -> bool {
        matches!(
            self,
            ProjectState::Disabled | ProjectState::Deleted | ProjectState::Archived
        )
    }

    /// Returns the wire name.
    pub fn as_str(&self) -> &str {
        match self {
            ProjectState::Preparing => "PREPARING",
            ProjectState::Loading => "LOADING",
            ProjectState::Enabled => "ENABLED",
            ProjectState::Disabled => "DISABLED",
            ProjectState::Deleted => "DELETED",
            ProjectState::Archived => "ARCHIVED",
            ProjectState::Other(s) => s,
        }
    }
}

impl From<String> for ProjectState {
    fn from(value: String) -> Self {
        match value.as_str() {
            "PREPARING" => ProjectState::Preparing,
            "LOADING" => ProjectState::Loading,
            "ENABLED" => ProjectState::Enabled,
            "DISABLED" => ProjectState::Disabled,
            "DELETED" => ProjectState::Deleted,
            "ARCHIVED" => ProjectState::Archived,
            _ => ProjectState::Other(value),
        }
    }
}

impl From<ProjectState> for String {
    fn from(value: ProjectState) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ProjectState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata of a workspace, unwrapped from `GET /gdc/projects/<id>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectInfo {
    /// Workspace title.
    pub title: String,
    /// Optional summary.
    pub summary: Option<String>,
    /// Lifecycle environment.
    pub environment: Environment,
    /// Bootstrap state.
    pub state: ProjectState,
}

/// Response envelope of the project resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectEnvelope {
    project: ProjectBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProjectBody {
    content: ProjectContent,
    meta: ProjectMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProjectContent {
    #[serde(default)]
    environment: Environment,
    state: ProjectState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProjectMeta {
    title: String,
    #[serde(default)]
    summary: Option<String>,
}

impl ProjectEnvelope {
    /// Wraps project info the way the server returns it.
    pub fn new(info: &ProjectInfo) -> Self {
        Self {
            project: ProjectBody {
                content: ProjectContent {
                    environment: info.environment,
                    state: info.state.clone(),
                },
                meta: ProjectMeta {
                    title: info.title.clone(),
                    summary: info.summary.clone(),
                },
            },
        }
    }

    /// Unwraps the envelope.
    pub fn into_info(self) -> ProjectInfo {
        ProjectInfo {
            title: self.project.meta.title,
            summary: self.project.meta.summary,
            environment: self.project.content.environment,
            state: self.project.content.state,
        }
    }
}

/// Body of `POST /gdc/projects`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateProjectRequest<'a> {
    project: NewProject<'a>,
}

#[derive(Debug, Clone, Serialize)]
struct NewProject<'a> {
    content: NewProjectContent<'a>,
    meta: NewProjectMeta<'a>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewProjectContent<'a> {
    guided_navigation: u8,
    driver: &'a str,
    authorization_token: &'a str,
    environment: Environment,
}

#[derive(Debug, Clone, Serialize)]
struct NewProjectMeta<'a> {
    title: &'a str,
    summary: Option<&'a str>,
}

impl<'a> CreateProjectRequest<'a> {
    /// Creates a project creation request.
    ///
    /// `authorization_token` is the platform-issued token that allows
    /// provisioning new workspaces; it is unrelated to the session token.
    pub fn new(
        authorization_token: &'a str,
        title: &'a str,
        summary: Option<&'a str>,
        driver: &'a str,
        environment: Environment,
    ) -> Self {
        Self {
            project: NewProject {
                content: NewProjectContent {
                    guided_navigation: 1,
                    driver,
                    authorization_token,
                    environment,
                },
                meta: NewProjectMeta { title, summary },
            },
        }
    }
}

/// Response carrying only a resource URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UriResponse {
    /// Resource URI.
    pub uri: String,
}

impl UriResponse {
    /// Returns the last path segment of the URI.
    pub fn last_segment(&self) -> ProtocolResult<&str> {
        self.uri
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ProtocolError::missing("uri"))
    }
}
