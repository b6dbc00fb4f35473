//! Authentication API client methods

use super::{SessionClient, error_message};
use crate::error::{ClientError, Result};
use crate::events::SessionEvent;
use crate::request::ApiRequest;
use crate::store::CredentialPair;
use crate::types::{
    LOGIN_PATH, LOGOUT_PATH, LoginRequest, LoginResponse, REFRESH_PATH, RefreshTokenRequest,
};

impl SessionClient {
    /// Log in with email and password and store the issued credentials
    pub async fn login(
        &self,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<LoginResponse> {
        let body = serde_json::to_value(LoginRequest {
            email: email.into(),
            password: password.into(),
        })?;

        let request = ApiRequest::post(LOGIN_PATH).json(body).without_refresh();
        let response: LoginResponse = self.execute(request).await?;

        self.session().store(&response.credentials())?;
        info!("logged in");
        Ok(response)
    }

    /// Exchange the stored refresh token for a new credential pair
    ///
    /// Failure clears the stored credentials and publishes `SessionExpired`.
    pub async fn refresh(&self) -> Result<CredentialPair> {
        self.inner.refresh.refresh(self).await
    }

    /// Revoke the refresh token server-side and forget the stored credentials
    ///
    /// Local credentials are cleared even when the server call fails; that
    /// failure is still returned.
    pub async fn logout(&self) -> Result<()> {
        let remote = match self.session().refresh_token()? {
            Some(refresh_token) => {
                let body = serde_json::to_value(RefreshTokenRequest { refresh_token })?;
                let request = ApiRequest::post(LOGOUT_PATH).json(body).without_refresh();
                self.execute_json(request).await.map(|_| ())
            }
            None => Ok(()),
        };

        self.session().clear()?;
        self.events().emit(SessionEvent::LoggedOut);
        info!("logged out");

        remote
    }

    /// Call the refresh endpoint directly, bypassing credential injection
    pub(crate) async fn request_refresh(&self, refresh_token: &str) -> Result<CredentialPair> {
        let body = serde_json::to_value(RefreshTokenRequest {
            refresh_token: refresh_token.to_string(),
        })?;
        let request = ApiRequest::post(REFRESH_PATH).json(body).without_refresh();

        let response = self.send(&request).await?;
        let status = response.status();

        if status.is_success() {
            Ok(response.json().await?)
        } else {
            let message = error_message(response, status).await;
            Err(ClientError::from_status(status, message))
        }
    }
}
