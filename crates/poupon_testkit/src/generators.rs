//! Property-based test generators using proptest.
//!
//! Identifiers are drawn from a small alphabet so master and slave sets
//! overlap often enough to exercise both sides of a diff.

use poupon_protocol::Metric;
use proptest::prelude::*;

/// Tag the generated metrics are diffed on.
pub const SYNC_TAG: &str = "sync";

/// Strategy for metric identifiers.
pub fn identifier_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["A", "B", "C", "D", "E", "F", "G", "H"]).prop_map(str::to_string)
}

/// Strategy for tag strings, with or without [`SYNC_TAG`].
pub fn tags_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop::sample::select(vec![SYNC_TAG, "kpi", "async", "finance", "sync2"]),
        0..4,
    )
    .prop_map(|tags| tags.join(" "))
}

/// Strategy for the metrics of one workspace.
///
/// Identifiers are unique within the returned set.
pub fn workspace_metrics_strategy(workspace: &'static str) -> impl Strategy<Value = Vec<Metric>> {
    prop::collection::btree_map(identifier_strategy(), tags_strategy(), 0..8).prop_map(
        move |entries| {
            entries
                .into_iter()
                .enumerate()
                .map(|(n, (id, tags))| Metric::new(id, format!("/gdc/md/{workspace}/obj/{n}"), tags))
                .collect()
        },
    )
}

/// Strategy for a (master, slave) pair of metric sets.
pub fn master_slave_strategy() -> impl Strategy<Value = (Vec<Metric>, Vec<Metric>)> {
    (
        workspace_metrics_strategy("master"),
        workspace_metrics_strategy("slave"),
    )
}
