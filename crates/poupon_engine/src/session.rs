//! Session management: credential exchange and request headers.
//!
//! A session holds the short-lived token (TT) derived from a long-lived
//! secret (SST). The token is never refreshed mid-session; a 401 on a
//! later call surfaces as an API error.

use crate::config::ClientConfig;
use crate::error::{EngineError, EngineResult};
use crate::transport::{Headers, HttpClient, HttpResponse};
use parking_lot::RwLock;
use poupon_protocol::{
    decode, encode, LoginRequest, LoginResponse, TokenResponse, SST_HEADER, TT_COOKIE,
};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

const LOGIN_PATH: &str = "/gdc/account/login";
const TOKEN_PATH: &str = "/gdc/account/token";
const JSON: &str = "application/json";

/// Input to [`Session::authenticate`].
///
/// Empty strings count as absent.
#[derive(Clone, Default)]
pub struct Credentials {
    secret: Option<Zeroizing<String>>,
    username: Option<String>,
    password: Option<Zeroizing<String>>,
}

impl Credentials {
    /// Credentials made of a long-lived secret.
    pub fn secret(secret: impl Into<String>) -> Self {
        Self {
            secret: Some(Zeroizing::new(secret.into())),
            ..Self::default()
        }
    }

    /// Credentials made of a username and password.
    pub fn password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(Zeroizing::new(password.into())),
            ..Self::default()
        }
    }

    fn usable_secret(&self) -> Option<&str> {
        self.secret.as_deref().map(String::as_str).filter(|s| !s.is_empty())
    }

    fn usable_login(&self) -> Option<(&str, &str)> {
        let username = self.username.as_deref().filter(|s| !s.is_empty())?;
        let password = self
            .password
            .as_deref()
            .map(String::as_str)
            .filter(|s| !s.is_empty())?;
        Some((username, password))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// An authenticated connection to one organization domain.
pub struct Session<C: HttpClient> {
    config: ClientConfig,
    client: C,
    token: RwLock<Option<Zeroizing<String>>>,
}

impl<C: HttpClient> Session<C> {
    /// Creates an unauthenticated session.
    pub fn new(config: ClientConfig, client: C) -> Self {
        Self {
            config,
            client,
            token: RwLock::new(None),
        }
    }

    /// Creates a session and derives its token from a long-lived secret.
    pub fn with_secret(config: ClientConfig, client: C, secret: &str) -> EngineResult<Self> {
        let session = Self::new(config, client);
        session.authenticate(&Credentials::secret(secret))?;
        Ok(session)
    }

    /// Returns the connection configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the underlying transport.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Resolves an endpoint path against the base URL.
    pub fn url(&self, path: &str) -> String {
        self.config.url(path)
    }

    /// Returns true once a short-lived token is held.
    pub fn is_authenticated(&self) -> bool {
        self.token.read().is_some()
    }

    /// Establishes the session token.
    ///
    /// A secret is exchanged for a token directly. Otherwise a
    /// username/password pair is first exchanged for a secret at the login
    /// endpoint. With neither, fails with [`EngineError::MissingCredentials`]
    /// without touching the network.
    pub fn authenticate(&self, credentials: &Credentials) -> EngineResult<()> {
        let token = if let Some(secret) = credentials.usable_secret() {
            self.derive_short_lived_token(secret)?
        } else if let Some((username, password)) = credentials.usable_login() {
            let secret = self.login(username, password, false)?;
            self.derive_short_lived_token(&secret)?
        } else {
            return Err(EngineError::MissingCredentials);
        };

        *self.token.write() = Some(token);
        info!(base_url = %self.config.base_url, "session authenticated");
        Ok(())
    }

    /// Exchanges a username and password for a long-lived secret.
    ///
    /// `remember` requests a longer-lived secret, suitable for storing.
    pub fn login(
        &self,
        username: &str,
        password: &str,
        remember: bool,
    ) -> EngineResult<Zeroizing<String>> {
        let body = encode(&LoginRequest::new(username, password, remember))?;
        let headers = vec![
            ("Accept".to_string(), JSON.to_string()),
            ("Content-Type".to_string(), JSON.to_string()),
        ];
        let response = self
            .client
            .post(&self.url(LOGIN_PATH), &headers, Some(&body))
            .map_err(EngineError::transport)?;
        let response = check_credential_response(response)?;

        debug!(login = username, "obtained long-lived secret");
        let secret = decode::<LoginResponse>(&response.body)?.into_secret()?;
        Ok(Zeroizing::new(secret))
    }

    /// Exchanges a long-lived secret for a short-lived token.
    pub fn derive_short_lived_token(&self, secret: &str) -> EngineResult<Zeroizing<String>> {
        let headers = vec![
            ("Accept".to_string(), JSON.to_string()),
            ("Content-Type".to_string(), JSON.to_string()),
            (SST_HEADER.to_string(), secret.to_string()),
        ];
        let response = self
            .client
            .get(&self.url(TOKEN_PATH), &headers)
            .map_err(EngineError::transport)?;
        let response = check_credential_response(response)?;

        debug!("derived short-lived token");
        let token = decode::<TokenResponse>(&response.body)?.into_token()?;
        Ok(Zeroizing::new(token))
    }

    /// Builds the header set of an authenticated call.
    ///
    /// Reads the token at call time, so a later `authenticate` is picked up.
    pub fn headers(&self) -> EngineResult<Headers> {
        let guard = self.token.read();
        let token = guard.as_ref().ok_or(EngineError::NotAuthenticated)?;
        Ok(vec![
            ("Accept".to_string(), JSON.to_string()),
            ("Content-Type".to_string(), JSON.to_string()),
            ("Cookie".to_string(), format!("{TT_COOKIE}={}", token.as_str())),
        ])
    }
}

/// Maps a credential endpoint response to the auth error taxonomy.
fn check_credential_response(response: HttpResponse) -> EngineResult<HttpResponse> {
    match response.status {
        200..=299 => Ok(response),
        429 => {
            let retry_after = response
                .header("Retry-After")
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            warn!(?retry_after, "credential exchange rate limited");
            Err(EngineError::RateLimited { retry_after })
        }
        status => {
            warn!(status, "credential exchange rejected");
            Err(EngineError::Authentication {
                status,
                body: response.body,
            })
        }
    }
}
