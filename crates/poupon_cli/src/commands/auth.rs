//! Interactive login capture.
//!
//! Trades a username and password for a remembered long-lived secret and
//! stores it for the organization domain. The password is never stored.

use crate::store::{ConfigStore, StoreResult};
use dialoguer::{theme::ColorfulTheme, Input, Password};
use poupon_engine::{ClientConfig, ReqwestClient, Session};
use tracing::info;
use zeroize::Zeroizing;

/// Prompts for credentials and stores the resulting secret.
pub fn run(store: &ConfigStore) -> Result<(), Box<dyn std::error::Error>> {
    let theme = ColorfulTheme::default();
    println!("Authenticate against the analytics platform API.");
    println!(
        "The long-lived secret will be saved in {}",
        store.login_path().display()
    );

    let domain: String = Input::with_theme(&theme)
        .with_prompt("Your organization sub-domain [company.org]")
        .interact_text()?;
    let login: String = Input::with_theme(&theme)
        .with_prompt("Your login email or alias for this sub-domain [email@company.org]")
        .interact_text()?;
    let password = Zeroizing::new(
        Password::with_theme(&theme)
            .with_prompt("Your password for this sub-domain")
            .interact()?,
    );

    let config = ClientConfig::for_domain(&domain);
    let client = ReqwestClient::new(config.request_timeout)?;
    let session = Session::new(config, client);
    let secret = session.login(&login, &password, true)?;

    remember_secret(store, domain.trim(), &secret)?;
    info!(domain = domain.trim(), "secret stored");
    println!("✓ Secret stored for {}", domain.trim());
    Ok(())
}

/// Stores (or replaces) the secret of a domain.
pub fn remember_secret(store: &ConfigStore, domain: &str, secret: &str) -> StoreResult<()> {
    let mut logins = store.read_logins()?;
    logins.set_secret(domain, secret);
    store.write_logins(&logins)
}
