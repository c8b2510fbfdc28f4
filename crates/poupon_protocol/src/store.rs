//! Persisted login and sync-configuration documents.
//!
//! These are owned by the CLI's config storage; the engine only reads them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Contents of `login.json`: organization domain to long-lived secret.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginFile {
    /// Secrets keyed by organization domain.
    #[serde(default)]
    pub tokens: BTreeMap<String, String>,
}

impl LoginFile {
    /// Returns the stored secret for a domain.
    pub fn secret_for(&self, domain: &str) -> Option<&str> {
        self.tokens.get(domain).map(String::as_str)
    }

    /// Stores (or replaces) the secret for a domain.
    pub fn set_secret(&mut self, domain: impl Into<String>, secret: impl Into<String>) {
        self.tokens.insert(domain.into(), secret.into());
    }
}

/// One slave workspace of a sync job and the tag scoping it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaveTarget {
    /// Slave workspace id.
    pub slave_pid: String,
    /// Tag selecting the metrics synchronized into this slave.
    pub tag: String,
}

/// A master workspace and the slaves it feeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncTarget {
    /// Master workspace id.
    pub master_pid: String,
    /// Organization domain both workspaces live in.
    pub sub_domain: String,
    /// Slaves, synchronized in order.
    #[serde(default)]
    pub slaves: Vec<SlaveTarget>,
}

/// Contents of `config_sync.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfigFile {
    /// Configured sync jobs.
    #[serde(default)]
    pub workspaces: Vec<SyncTarget>,
}

impl SyncConfigFile {
    /// Adds a sync job.
    ///
    /// A job for the same master and domain already present gets its slave
    /// list replaced; otherwise the job is appended.
    pub fn upsert(&mut self, target: SyncTarget) {
        match self
            .workspaces
            .iter_mut()
            .find(|t| t.master_pid == target.master_pid && t.sub_domain == target.sub_domain)
        {
            Some(existing) => existing.slaves = target.slaves,
            None => self.workspaces.push(target),
        }
    }
}
