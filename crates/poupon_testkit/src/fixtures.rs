//! Ready-made platforms for workflow tests.

use crate::platform::FakePlatform;
use poupon_engine::{Orchestrator, ResourceClient, WorkflowConfig};
use poupon_protocol::Environment;
use std::sync::Arc;
use std::time::Duration;

/// Long-lived secret every fixture platform accepts.
pub const SECRET: &str = "sst-fixture";

/// Provisioning token used to create backup targets.
pub const AUTH_TOKEN: &str = "provisioning-token";

/// Master workspace id of [`SyncFixture`].
pub const MASTER: &str = "master01";

/// Slave workspace id of [`SyncFixture`].
pub const SLAVE: &str = "slave01";

/// Source workspace id of [`BackupFixture`].
pub const SOURCE: &str = "source01";

/// Workflow settings that never sleep between polls.
pub fn fast_workflow() -> WorkflowConfig {
    WorkflowConfig::default()
        .with_poll_interval(Duration::ZERO)
        .with_poll_timeout(Duration::from_secs(30))
}

/// Builds an orchestrator over a fixture platform.
///
/// # Panics
///
/// Panics if the platform rejects [`SECRET`].
pub fn orchestrator_for(
    platform: &Arc<FakePlatform>,
    config: WorkflowConfig,
) -> Orchestrator<Arc<FakePlatform>> {
    let session = platform
        .session(SECRET)
        .expect("fixture secret is registered");
    Orchestrator::new(ResourceClient::new(session), config)
}

/// A master and a slave workspace in one organization.
pub struct SyncFixture {
    /// The fake platform.
    pub platform: Arc<FakePlatform>,
}

impl SyncFixture {
    /// Master and slave with no metrics.
    pub fn empty() -> Self {
        let platform = FakePlatform::shared();
        platform
            .with_secret(SECRET)
            .add_workspace(MASTER, "Master", Environment::Production)
            .add_workspace(SLAVE, "Slave", Environment::Production);
        Self { platform }
    }

    /// The canonical scenario.
    ///
    /// Master: `A` tagged `kpi sync`, `B` tagged `kpi`.
    /// Slave: `A` tagged `sync`, `C` tagged `sync`.
    pub fn reference() -> Self {
        let fixture = Self::empty();
        fixture.platform.add_metric(MASTER, "A", "kpi sync");
        fixture.platform.add_metric(MASTER, "B", "kpi");
        fixture.platform.add_metric(SLAVE, "A", "sync");
        fixture.platform.add_metric(SLAVE, "C", "sync");
        fixture
    }

    /// Orchestrator with [`fast_workflow`] settings.
    pub fn orchestrator(&self) -> Orchestrator<Arc<FakePlatform>> {
        orchestrator_for(&self.platform, fast_workflow())
    }
}

/// A single enabled source workspace to back up.
pub struct BackupFixture {
    /// The fake platform.
    pub platform: Arc<FakePlatform>,
}

impl BackupFixture {
    /// Source `Sales` in production with two metrics.
    pub fn new() -> Self {
        let platform = FakePlatform::shared();
        platform
            .with_secret(SECRET)
            .add_workspace(SOURCE, "Sales", Environment::Production);
        platform.add_metric(SOURCE, "revenue", "kpi");
        platform.add_metric(SOURCE, "margin", "kpi sync");
        Self { platform }
    }

    /// Orchestrator with [`fast_workflow`] settings.
    pub fn orchestrator(&self) -> Orchestrator<Arc<FakePlatform>> {
        orchestrator_for(&self.platform, fast_workflow())
    }
}

impl Default for BackupFixture {
    fn default() -> Self {
        Self::new()
    }
}
