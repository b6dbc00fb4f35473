//! Refresh-token exchange
//!
//! All refreshes go through one async mutex. A request that failed with 401
//! remembers the access token it carried; once it holds the lock it compares
//! that token with the stored one, and if another request already refreshed
//! it reuses the new pair instead of calling the endpoint again.

use crate::client::SessionClient;
use crate::error::{ClientError, Result};
use crate::events::SessionEvent;
use crate::store::CredentialPair;
use tokio::sync::Mutex;
use tracing::instrument;

#[derive(Debug, Default)]
pub struct RefreshCoordinator {
    gate: Mutex<()>,
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recover from a 401 received for a request that carried `attached`
    #[instrument(name = "session_recover", skip_all)]
    pub async fn recover(
        &self,
        client: &SessionClient,
        attached: Option<&str>,
    ) -> Result<CredentialPair> {
        let _guard = self.gate.lock().await;

        if let Some(current) = client.session().credentials()? {
            if Some(current.access_token.as_str()) != attached {
                debug!("session already refreshed by a concurrent request");
                return Ok(current);
            }
        }

        Self::exchange(client).await
    }

    /// Exchange the stored refresh token unconditionally
    #[instrument(name = "session_refresh", skip_all)]
    pub async fn refresh(&self, client: &SessionClient) -> Result<CredentialPair> {
        let _guard = self.gate.lock().await;
        Self::exchange(client).await
    }

    async fn exchange(client: &SessionClient) -> Result<CredentialPair> {
        let session = client.session();

        let Some(refresh_token) = session.refresh_token()? else {
            return Err(Self::expire(client, "no refresh token stored".to_string()));
        };

        match client.request_refresh(&refresh_token).await {
            Ok(pair) => {
                session.store(&pair)?;
                info!("session refreshed");
                client.events().emit(SessionEvent::TokensRotated);
                Ok(pair)
            }
            Err(e) => Err(Self::expire(client, e.to_string())),
        }
    }

    fn expire(client: &SessionClient, reason: String) -> ClientError {
        warn!("session expired: {reason}");

        if let Err(e) = client.session().clear() {
            error!("failed to clear stored credentials: {e}");
        }

        client.events().emit(SessionEvent::SessionExpired {
            login_path: client.config().login_path.clone(),
        });

        ClientError::SessionExpired(reason)
    }
}
