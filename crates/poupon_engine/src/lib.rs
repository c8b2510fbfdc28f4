//! # Poupon Engine
//!
//! Client core for a multi-tenant analytics platform's REST API.
//!
//! This crate provides:
//! - Session management (long-lived secret → short-lived token)
//! - A typed resource client over a pluggable HTTP transport
//! - A fixed-interval task poller for asynchronous server tasks
//! - Two orchestrated workflows: full workspace backup and tag-scoped
//!   metric synchronization between a master and a slave workspace
//!
//! ## Architecture
//!
//! Data flows one way:
//! 1. The orchestrator calls resource client operations
//! 2. Export/import operations return a [`TaskHandle`]
//! 3. The poller blocks on that handle before the next dependent step
//!
//! Every workflow is a linear state machine. The first error aborts the
//! workflow; completed steps are not rolled back.
//!
//! ## Polling
//!
//! Polls run at a fixed interval with no backoff and, by default, no
//! upper bound. A hung server task blocks the workflow until it is
//! cancelled through a [`CancelToken`] or a configured timeout elapses.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod config;
mod error;
mod http;
mod jobs;
mod orchestrator;
mod plan;
mod poller;
mod session;
mod transport;

pub use client::{DeleteReport, ResourceClient};
pub use config::{ClientConfig, PollConfig, WorkflowConfig};
pub use error::{status_reason, EngineError, EngineResult};
pub use http::ReqwestClient;
pub use jobs::{run_sync_jobs, JobOutcome, JobsSummary};
pub use orchestrator::{BackupStage, Orchestrator, SyncReport, SyncStage, WorkflowStage};
pub use plan::{SyncAction, SyncPlan};
pub use poller::{CancelToken, PollStatus, TaskPoller};
pub use session::{Credentials, Session};
pub use transport::{Headers, HttpClient, HttpResponse, Method, MockHttpClient, RecordedRequest};

pub use poupon_protocol::TaskHandle;
