//! Tag-scoped diff between a master and a slave workspace.

use poupon_protocol::Metric;
use std::collections::BTreeMap;

/// What a sync run does with one metric identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    /// Export from master, import into slave.
    Upsert,
    /// Stale tagged metric to remove.
    Delete,
}

/// Per-run mapping of identifier to action, with the object URI to act on.
///
/// Recomputed on every run and never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    tag: String,
    upsert: BTreeMap<String, String>,
    delete: BTreeMap<String, String>,
}

impl SyncPlan {
    /// Diffs master and slave metrics for `tag`.
    ///
    /// Every master metric carrying the tag is upserted. Every slave metric
    /// carrying the tag whose identifier is not upserted is deleted. The
    /// two sets are disjoint by identifier.
    pub fn build<'a, M, S>(master: M, slave: S, tag: &str) -> Self
    where
        M: IntoIterator<Item = &'a Metric>,
        S: IntoIterator<Item = &'a Metric>,
    {
        let upsert: BTreeMap<String, String> = master
            .into_iter()
            .filter(|m| m.has_tag(tag))
            .map(|m| (m.identifier.clone(), m.link.clone()))
            .collect();

        let delete = slave
            .into_iter()
            .filter(|m| m.has_tag(tag) && !upsert.contains_key(&m.identifier))
            .map(|m| (m.identifier.clone(), m.link.clone()))
            .collect();

        Self {
            tag: tag.to_string(),
            upsert,
            delete,
        }
    }

    /// Tag the plan was built for.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Identifier → master object URI of metrics to upsert.
    pub fn upsert(&self) -> &BTreeMap<String, String> {
        &self.upsert
    }

    /// Identifier → slave object URI of metrics to delete.
    pub fn delete(&self) -> &BTreeMap<String, String> {
        &self.delete
    }

    /// Object URIs to export.
    pub fn upsert_uris(&self) -> Vec<String> {
        self.upsert.values().cloned().collect()
    }

    /// Object URIs to delete.
    pub fn delete_uris(&self) -> Vec<String> {
        self.delete.values().cloned().collect()
    }

    /// Action planned for an identifier, if any.
    pub fn action_for(&self, identifier: &str) -> Option<SyncAction> {
        if self.upsert.contains_key(identifier) {
            Some(SyncAction::Upsert)
        } else if self.delete.contains_key(identifier) {
            Some(SyncAction::Delete)
        } else {
            None
        }
    }

    /// Returns true if the run has nothing to do.
    pub fn is_empty(&self) -> bool {
        self.upsert.is_empty() && self.delete.is_empty()
    }
}
