//! CLI command implementations.

pub mod auth;
pub mod backup;
pub mod configure;
pub mod sync;

use poupon_engine::{ClientConfig, EngineResult, ReqwestClient, Session};

/// Opens a network session for a domain from its stored secret.
pub fn connect(domain: &str, secret: &str) -> EngineResult<Session<ReqwestClient>> {
    let config = ClientConfig::for_domain(domain);
    let client = ReqwestClient::new(config.request_timeout)?;
    Session::with_secret(config, client, secret)
}
