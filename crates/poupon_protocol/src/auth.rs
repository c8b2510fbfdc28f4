//! Credential exchange payloads.
//!
//! Two hops exist: username/password are traded for a long-lived secret
//! (SST) at the login endpoint, and the SST is traded for a short-lived
//! token (TT) at the token endpoint. Only the TT travels on regular calls,
//! embedded in a session cookie.

use crate::error::{ProtocolError, ProtocolResult};
use serde::{Deserialize, Serialize};

/// Header carrying the long-lived secret on the token endpoint.
pub const SST_HEADER: &str = "X-GDC-AuthSST";

/// Cookie name carrying the short-lived token on authenticated calls.
pub const TT_COOKIE: &str = "GDCAuthTT";

/// Body of `POST /gdc/account/login`.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    #[serde(rename = "postUserLogin")]
    post_user_login: LoginFields<'a>,
}

#[derive(Debug, Clone, Serialize)]
struct LoginFields<'a> {
    login: &'a str,
    password: &'a str,
    remember: u8,
    verify_level: u8,
}

impl<'a> LoginRequest<'a> {
    /// Creates a login request.
    ///
    /// `remember` asks for a longer-lived secret instead of a session-bound
    /// one. The secret is always requested back in a custom header
    /// (verify level 2) rather than as a cookie.
    pub fn new(login: &'a str, password: &'a str, remember: bool) -> Self {
        Self {
            post_user_login: LoginFields {
                login,
                password,
                remember: u8::from(remember),
                verify_level: 2,
            },
        }
    }
}

/// Response of the login endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(rename = "userLogin")]
    user_login: TokenField,
}

/// Response of `GET /gdc/account/token`.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    #[serde(rename = "userToken")]
    user_token: TokenField,
}

#[derive(Debug, Clone, Deserialize)]
struct TokenField {
    #[serde(default)]
    token: Option<String>,
}

impl TokenField {
    fn into_token(self, field: &'static str) -> ProtocolResult<String> {
        self.token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ProtocolError::missing(field))
    }
}

impl LoginResponse {
    /// Extracts the long-lived secret.
    pub fn into_secret(self) -> ProtocolResult<String> {
        self.user_login.into_token("userLogin.token")
    }
}

impl TokenResponse {
    /// Extracts the short-lived token.
    pub fn into_token(self) -> ProtocolResult<String> {
        self.user_token.into_token("userToken.token")
    }
}
