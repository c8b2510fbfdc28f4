//! Configuration for the client and its workflows.

use poupon_protocol::{ExportObjectsFlags, ExportProjectFlags, ImportObjectsFlags, DEFAULT_DRIVER};
use std::time::Duration;

/// Host suffix appended to every organization domain.
const PLATFORM_HOST: &str = "gooddata.com";

/// Connection configuration for one organization domain.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL every endpoint path is appended to.
    pub base_url: String,
    /// Per-request timeout for the HTTP transport.
    pub request_timeout: Duration,
}

impl ClientConfig {
    /// Creates a configuration with an explicit base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Creates a configuration for an organization domain.
    ///
    /// The domain always names a platform sub-domain: `acme` resolves to
    /// `https://acme.gooddata.com` and `company.org` to
    /// `https://company.org.gooddata.com`. Use [`ClientConfig::with_base_url`]
    /// to reach any other host.
    pub fn for_domain(domain: &str) -> Self {
        let domain = domain.trim().trim_matches('/');
        Self::new(format!("https://{domain}.{PLATFORM_HOST}"))
    }

    /// Sets the base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Sets the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Resolves an endpoint path or absolute URL against the base URL.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

/// Fixed-interval polling configuration.
///
/// There is no backoff. Without a timeout a poll waits for as long as the
/// server keeps reporting the task as in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay between consecutive status checks.
    pub interval: Duration,
    /// Upper bound on the total wait, if any.
    pub timeout: Option<Duration>,
}

impl PollConfig {
    /// Creates an unbounded poll configuration with the given interval.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            timeout: None,
        }
    }

    /// Sets the interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Bounds the total wait.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

/// Knobs of the backup and sync workflows.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// Polling used by the backup workflow.
    pub backup_poll: PollConfig,
    /// Polling used by the metric sync workflow.
    pub sync_poll: PollConfig,
    /// Options of the full export taken by backups.
    pub export_project: ExportProjectFlags,
    /// Options of the partial export taken by syncs.
    pub export_objects: ExportObjectsFlags,
    /// Options of the partial import taken by syncs.
    pub import_objects: ImportObjectsFlags,
    /// Database driver of backup target workspaces.
    pub driver: String,
}

impl WorkflowConfig {
    /// Sets both poll intervals.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.backup_poll = self.backup_poll.with_interval(interval);
        self.sync_poll = self.sync_poll.with_interval(interval);
        self
    }

    /// Bounds both polls.
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.backup_poll = self.backup_poll.with_timeout(timeout);
        self.sync_poll = self.sync_poll.with_timeout(timeout);
        self
    }

    /// Sets the full export options.
    pub fn with_export_project(mut self, flags: ExportProjectFlags) -> Self {
        self.export_project = flags;
        self
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            backup_poll: PollConfig::new(Duration::from_secs(1)),
            sync_poll: PollConfig::new(Duration::from_secs(10)),
            export_project: ExportProjectFlags::default(),
            export_objects: ExportObjectsFlags::default(),
            import_objects: ImportObjectsFlags::default(),
            driver: DEFAULT_DRIVER.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_resolution() {
        assert_eq!(
            ClientConfig::for_domain("acme").base_url,
            "https://acme.gooddata.com"
        );
        // dotted domains are still platform sub-domains
        assert_eq!(
            ClientConfig::for_domain("company.org/").base_url,
            "https://company.org.gooddata.com"
        );
        assert_eq!(
            ClientConfig::for_domain("company.org")
                .with_base_url("https://analytics.company.org/")
                .base_url,
            "https://analytics.company.org"
        );
    }

    #[test]
    fn url_joining() {
        let config = ClientConfig::new("https://acme.example.com/");
        assert_eq!(
            config.url("/gdc/account/token"),
            "https://acme.example.com/gdc/account/token"
        );
        assert_eq!(config.url("gdc/projects"), "https://acme.example.com/gdc/projects");
        assert_eq!(
            config.url("http://other.example.com/x"),
            "http://other.example.com/x"
        );
    }

    #[test]
    fn workflow_defaults_match_reference_intervals() {
        let config = WorkflowConfig::default();
        assert_eq!(config.backup_poll.interval, Duration::from_secs(1));
        assert_eq!(config.sync_poll.interval, Duration::from_secs(10));
        assert_eq!(config.backup_poll.timeout, None);
        assert_eq!(config.driver, "Pg");
        assert!(config.export_objects.export_attribute_properties);
    }

    #[test]
    fn workflow_builder() {
        let config = WorkflowConfig::default()
            .with_poll_interval(Duration::ZERO)
            .with_poll_timeout(Duration::from_secs(5));
        assert_eq!(config.sync_poll.interval, Duration::ZERO);
        assert_eq!(config.backup_poll.timeout, Some(Duration::from_secs(5)));
    }
}
