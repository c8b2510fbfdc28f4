//! # Poupon Protocol
//!
//! Wire payloads and persisted documents for the poupon analytics API client.
//!
//! This crate provides:
//! - Request envelopes with the exact field names the platform expects
//! - Response envelopes and extraction of the nested payloads
//! - `Metric`, `TaskHandle`, `TaskStatus`, `ProjectInfo` domain types
//! - The persisted login and sync-configuration documents
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod auth;
mod error;
mod metric;
mod project;
mod store;
mod task;

pub use auth::{LoginRequest, LoginResponse, TokenResponse, SST_HEADER, TT_COOKIE};
pub use error::{ProtocolError, ProtocolResult};
pub use metric::{Metric, MetricsQuery, QueryEntries, METRIC_CATEGORY};
pub use project::{
    CreateProjectRequest, Environment, ProjectEnvelope, ProjectInfo, ProjectState, UriResponse,
    DEFAULT_DRIVER,
};
pub use store::{LoginFile, SlaveTarget, SyncConfigFile, SyncTarget};
pub use task::{
    Artifact, ExportObjectsFlags, ExportObjectsRequest, ExportProjectFlags, ExportProjectRequest,
    ExportResponse, ImportObjectsFlags, ImportObjectsRequest, ImportProjectRequest, StatusLink,
    TaskHandle, TaskState, TaskStateResponse, TaskStatus,
};

/// Parses a JSON body into a typed payload.
pub fn decode<T: serde::de::DeserializeOwned>(body: &str) -> ProtocolResult<T> {
    serde_json::from_str(body).map_err(ProtocolError::from)
}

/// Serializes a typed payload into a JSON body.
pub fn encode<T: serde::Serialize>(value: &T) -> ProtocolResult<String> {
    serde_json::to_string(value).map_err(ProtocolError::from)
}
