//! StagPower API session client

pub mod auth;

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::events::{SessionEvent, SessionEvents};
use crate::refresh::RefreshCoordinator;
use crate::request::{ApiRequest, RequestInterceptor};
use crate::store::{MemoryTokenStore, Session, TokenStore};
use crate::types::RotatedTokens;
use reqwest::{Client, ClientBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::instrument;

/// Authenticated client for the StagPower REST API
#[derive(Clone)]
pub struct SessionClient {
    inner: Arc<Inner>,
}

struct Inner {
    http: Client,
    config: ClientConfig,
    session: Session,
    interceptor: RequestInterceptor,
    refresh: RefreshCoordinator,
    events: SessionEvents,
}

impl SessionClient {
    /// Create a new client with an in-memory token store
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    /// Create a new client builder
    pub fn builder() -> SessionClientBuilder {
        SessionClientBuilder::default()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Session manager owning the stored credentials
    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    pub fn events(&self) -> &SessionEvents {
        &self.inner.events
    }

    /// Subscribe to session lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Execute a request and decode its JSON body
    pub async fn execute<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        let body = self.dispatch(request).await?;
        Ok(serde_json::from_value(body)?)
    }

    /// Execute a request and return its JSON body
    ///
    /// An empty body is `null`; a body that is not JSON comes back as a string.
    pub async fn execute_json(&self, request: ApiRequest) -> Result<Value> {
        self.dispatch(request).await
    }

    #[instrument(
        name = "session_request",
        skip_all,
        fields(method = %request.method(), path = %request.path())
    )]
    async fn dispatch(&self, mut request: ApiRequest) -> Result<Value> {
        loop {
            let attached = self
                .inner
                .interceptor
                .apply(&mut request, &self.inner.session)?;
            debug!(
                authenticated = attached.is_some(),
                retried = request.is_retried(),
                "sending request"
            );

            let response = self.send(&request).await?;
            let status = response.status();

            if status.is_success() {
                let body = read_body(response).await?;
                self.observe_success(&body)?;
                return Ok(body);
            }

            let message = error_message(response, status).await;

            if status == StatusCode::UNAUTHORIZED && request.can_refresh() {
                request.mark_retried();
                debug!("access token rejected, refreshing session");
                self.inner.refresh.recover(self, attached.as_deref()).await?;
                continue;
            }

            self.notify_failure(status, &request);
            return Err(ClientError::from_status(status, message));
        }
    }

    /// Send a request exactly as described, without touching credentials
    pub(crate) async fn send(&self, request: &ApiRequest) -> Result<reqwest::Response> {
        let url = self.inner.config.endpoint(request.path());
        let mut builder = self
            .inner
            .http
            .request(request.method().clone(), url)
            .headers(request.headers().clone());

        if !request.query_pairs().is_empty() {
            builder = builder.query(request.query_pairs());
        }
        if let Some(body) = request.body() {
            builder = builder.json(body);
        }

        Ok(builder.send().await?)
    }

    fn observe_success(&self, body: &Value) -> Result<()> {
        let tokens = RotatedTokens::from_body(body);
        let rotated = self.inner.session.rotate(
            tokens.access_token.as_deref(),
            tokens.refresh_token.as_deref(),
        )?;

        if rotated {
            debug!("stored tokens rotated by response");
            self.inner.events.emit(SessionEvent::TokensRotated);
        }
        Ok(())
    }

    fn notify_failure(&self, status: StatusCode, request: &ApiRequest) {
        let path = request.path().to_string();
        match status.as_u16() {
            403 => {
                warn!("permission denied for {path}");
                self.inner.events.emit(SessionEvent::PermissionDenied { path });
            }
            code if code >= 500 => {
                warn!("server error {code} for {path}");
                self.inner
                    .events
                    .emit(SessionEvent::ServerError { status: code, path });
            }
            _ => {}
        }
    }
}

impl fmt::Debug for SessionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionClient")
            .field("api_url", &self.inner.config.api_url)
            .field("api_prefix", &self.inner.config.api_prefix)
            .finish_non_exhaustive()
    }
}

/// Body of a successful response: JSON when it parses, the raw text otherwise
async fn read_body(response: reqwest::Response) -> Result<Value> {
    let bytes = response.bytes().await?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned())))
}

pub(crate) async fn error_message(response: reqwest::Response, status: StatusCode) -> String {
    match response.text().await {
        Ok(text) if !text.trim().is_empty() => text,
        _ => status.to_string(),
    }
}

/// Builder for SessionClient
#[derive(Default)]
pub struct SessionClientBuilder {
    config: Option<ClientConfig>,
    store: Option<Arc<dyn TokenStore>>,
    http: Option<Client>,
    events: Option<SessionEvents>,
}

impl SessionClientBuilder {
    /// Set the full configuration
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the base URL, keeping every other configuration value
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.config.get_or_insert_with(ClientConfig::default).api_url = url.into();
        self
    }

    /// Set the token store (defaults to an in-memory store)
    pub fn token_store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use a preconfigured HTTP client; its timeout and user agent win
    pub fn http_client(mut self, client: Client) -> Self {
        self.http = Some(client);
        self
    }

    /// Publish to an existing event channel
    pub fn events(mut self, events: SessionEvents) -> Self {
        self.events = Some(events);
        self
    }

    /// Build the client
    pub fn build(self) -> Result<SessionClient> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let http = match self.http {
            Some(client) => client,
            None => ClientBuilder::new()
                .timeout(config.timeout())
                .user_agent(config.user_agent.clone())
                .build()?,
        };

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryTokenStore::new()));

        Ok(SessionClient {
            inner: Arc::new(Inner {
                http,
                interceptor: RequestInterceptor::from_config(&config)?,
                session: Session::new(store),
                refresh: RefreshCoordinator::new(),
                events: self.events.unwrap_or_default(),
                config,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let client = SessionClient::builder().build().unwrap();
        assert_eq!(client.config(), &ClientConfig::default());
        assert!(!client.session().is_authenticated().unwrap());
    }

    #[test]
    fn test_builder_api_url() {
        let client = SessionClient::builder()
            .api_url("https://api.stagpower.vn")
            .build()
            .unwrap();
        assert_eq!(client.config().api_url, "https://api.stagpower.vn");
        assert_eq!(client.config().api_prefix, "/api/v1");
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let result = SessionClient::builder().api_url("not a url").build();
        assert!(matches!(result, Err(ClientError::Configuration(_))));
    }
}
