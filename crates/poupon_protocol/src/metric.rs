//! Metric entries returned by the metadata query endpoint.

use serde::{Deserialize, Serialize};

/// Category value the query endpoint uses for computed measures.
pub const METRIC_CATEGORY: &str = "metric";

/// A named computed measure in a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metric {
    /// Identifier, unique within the workspace.
    pub identifier: String,
    /// Object URI (`/gdc/md/<workspace>/obj/<n>`).
    pub link: String,
    /// Space-delimited free-text tags.
    #[serde(default)]
    pub tags: String,
    /// Human-readable title.
    #[serde(default)]
    pub title: Option<String>,
    /// Metadata category reported by the server.
    #[serde(default)]
    pub category: Option<String>,
}

impl Metric {
    /// Creates a metric entry.
    pub fn new(
        identifier: impl Into<String>,
        link: impl Into<String>,
        tags: impl Into<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            link: link.into(),
            tags: tags.into(),
            title: None,
            category: Some(METRIC_CATEGORY.to_string()),
        }
    }

    /// Iterates over the individual tags.
    pub fn tag_list(&self) -> impl Iterator<Item = &str> {
        self.tags.split_whitespace()
    }

    /// Returns true if `tag` is one of the whitespace-separated tags.
    ///
    /// Matching is on whole tags: `sync` does not match `async`.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tag_list().any(|t| t == tag)
    }

    /// Returns true if the entry is a metric rather than another metadata
    /// object the query returned alongside.
    ///
    /// Entries without a category are kept: the endpoint is metric-scoped
    /// and older servers omit the field.
    pub fn is_metric(&self) -> bool {
        self.category
            .as_deref()
            .map_or(true, |c| c == METRIC_CATEGORY)
    }
}

/// Response of `GET /gdc/md/<workspace>/query/metrics`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsQuery {
    /// Query envelope.
    pub query: QueryEntries,
}

/// Inner `query` object.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryEntries {
    /// All returned entries.
    #[serde(default)]
    pub entries: Vec<Metric>,
}

impl MetricsQuery {
    /// Builds a query response from entries.
    pub fn from_entries(entries: Vec<Metric>) -> Self {
        Self {
            query: QueryEntries { entries },
        }
    }

    /// Consumes the response, keeping only true metrics.
    pub fn into_metrics(self) -> impl Iterator<Item = Metric> {
        self.query.entries.into_iter().filter(Metric::is_metric)
    }
}
