//! Wire types of the authentication endpoints

use crate::store::CredentialPair;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Path of the login endpoint below the API prefix
pub const LOGIN_PATH: &str = "/auth/login";

/// Path of the refresh endpoint below the API prefix
pub const REFRESH_PATH: &str = "/auth/refresh";

/// Path of the logout endpoint below the API prefix
pub const LOGOUT_PATH: &str = "/auth/logout";

#[derive(Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// User profile as returned by the API
    #[serde(default)]
    pub user: Value,
}

impl LoginResponse {
    pub fn credentials(&self) -> CredentialPair {
        CredentialPair::new(&self.access_token, &self.refresh_token)
    }
}

/// Body of both the refresh and the logout call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

/// Tokens a successful response may carry alongside its payload
#[derive(Debug, Default)]
pub(crate) struct RotatedTokens {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl RotatedTokens {
    /// Extract tokens from a response body; non-object bodies carry none
    pub(crate) fn from_body(body: &Value) -> Self {
        let field = |name: &str| body.get(name).and_then(Value::as_str).map(str::to_owned);
        Self {
            access_token: field("accessToken"),
            refresh_token: field("refreshToken"),
        }
    }
}
