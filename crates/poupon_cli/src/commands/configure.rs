//! Interactive sync-configuration capture.

use crate::store::{ConfigStore, StoreResult};
use dialoguer::{theme::ColorfulTheme, Confirm, Input};
use poupon_protocol::{SlaveTarget, SyncTarget};

/// Prompts for a master workspace and its slaves, then saves the job.
pub fn run(store: &ConfigStore) -> Result<(), Box<dyn std::error::Error>> {
    let theme = ColorfulTheme::default();
    println!("Create a new sync configuration for your workspaces.");

    let domain: String = Input::with_theme(&theme)
        .with_prompt("Your organization sub-domain [company.org]")
        .interact_text()?;
    let master: String = Input::with_theme(&theme)
        .with_prompt("ID of the master workspace")
        .interact_text()?;

    let mut slaves = Vec::new();
    loop {
        let slave_pid: String = Input::with_theme(&theme)
            .with_prompt("ID of the slave workspace")
            .interact_text()?;
        let tag: String = Input::with_theme(&theme)
            .with_prompt("Tag of the metrics to update in this slave workspace")
            .interact_text()?;
        slaves.push(SlaveTarget {
            slave_pid: slave_pid.trim().to_string(),
            tag: tag.trim().to_string(),
        });

        let another = Confirm::with_theme(&theme)
            .with_prompt("Add another slave workspace?")
            .default(false)
            .interact()?;
        if !another {
            break;
        }
    }

    let target = SyncTarget {
        master_pid: master.trim().to_string(),
        sub_domain: domain.trim().to_string(),
        slaves,
    };
    let count = target.slaves.len();
    save_target(store, target)?;
    println!(
        "✓ Sync configuration saved to {} ({count} slave workspace(s))",
        store.sync_config_path().display()
    );
    Ok(())
}

/// Merges a sync job into the stored configuration.
pub fn save_target(store: &ConfigStore, target: SyncTarget) -> StoreResult<()> {
    let mut config = store.read_sync_config()?;
    config.upsert(target);
    store.write_sync_config(&config)
}
