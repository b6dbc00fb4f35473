//! Outbound request descriptor and credential injection

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::store::Session;
use reqwest::Method;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;

/// A request that can be dispatched, re-authorized and replayed
///
/// Unlike `reqwest::RequestBuilder` the descriptor owns a plain JSON body, so
/// the retry path can rewrite its headers and send it a second time.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    body: Option<Value>,
    retried: bool,
    refreshable: bool,
}

impl ApiRequest {
    /// Create a request for a path below the API prefix
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
            retried: false,
            refreshable: true,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Append a query parameter
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Set a header, replacing any previous value
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set the JSON body
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Never answer a 401 on this request with a refresh cycle
    pub fn without_refresh(mut self) -> Self {
        self.refreshable = false;
        self
    }

    pub const fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub const fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    /// Whether the refresh-and-retry cycle already ran for this request
    pub const fn is_retried(&self) -> bool {
        self.retried
    }

    pub(crate) const fn can_refresh(&self) -> bool {
        self.refreshable && !self.retried
    }

    pub(crate) const fn mark_retried(&mut self) {
        self.retried = true;
    }
}

/// Attaches stored credentials to outbound requests
#[derive(Debug, Clone, Default)]
pub struct RequestInterceptor {
    refresh_header: Option<HeaderName>,
}

impl RequestInterceptor {
    /// Interceptor that also sends the refresh token under `refresh_header`
    pub const fn new(refresh_header: Option<HeaderName>) -> Self {
        Self { refresh_header }
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        if !config.send_refresh_header {
            return Ok(Self::default());
        }

        let name = HeaderName::from_bytes(config.refresh_header.as_bytes())
            .map_err(|e| ClientError::Configuration(format!("refresh_header: {e}")))?;
        Ok(Self::new(Some(name)))
    }

    /// Rewrite the request's credential headers from the session
    ///
    /// Headers are replaced rather than appended, and removed when the session
    /// holds no token. Returns the access token that was attached.
    pub fn apply(&self, request: &mut ApiRequest, session: &Session) -> Result<Option<String>> {
        let access = session.access_token()?;

        match &access {
            Some(token) => {
                request.headers.insert(AUTHORIZATION, bearer(token)?);
            }
            None => {
                request.headers.remove(AUTHORIZATION);
            }
        }

        if let Some(name) = &self.refresh_header {
            match session.refresh_token()? {
                Some(token) => {
                    request.headers.insert(name.clone(), bearer(&token)?);
                }
                None => {
                    request.headers.remove(name);
                }
            }
        }

        Ok(access)
    }
}

fn bearer(token: &str) -> Result<HeaderValue> {
    let mut value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
        ClientError::InvalidCredential("token contains characters not allowed in a header".into())
    })?;
    value.set_sensitive(true);
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::{CredentialPair, MemoryTokenStore, MockTokenStore};
    use std::sync::Arc;

    fn session_with(pair: Option<CredentialPair>) -> Session {
        let session = Session::new(Arc::new(MemoryTokenStore::new()));
        if let Some(pair) = pair {
            session.store(&pair).unwrap();
        }
        session
    }

    #[test]
    fn test_injects_bearer_header() {
        let session = session_with(Some(CredentialPair::new("A1", "R1")));
        let mut request = ApiRequest::get("/members");

        let attached = RequestInterceptor::default()
            .apply(&mut request, &session)
            .unwrap();

        assert_eq!(attached.as_deref(), Some("A1"));
        assert_eq!(request.headers()[AUTHORIZATION], "Bearer A1");
        assert!(request.headers()[AUTHORIZATION].is_sensitive());
        assert_eq!(request.headers().len(), 1);
    }

    #[test]
    fn test_apply_is_idempotent() {
        let session = session_with(Some(CredentialPair::new("A1", "R1")));
        let interceptor = RequestInterceptor::new(Some(HeaderName::from_static("x-refresh-token")));
        let mut request = ApiRequest::get("/members");

        interceptor.apply(&mut request, &session).unwrap();
        let first = request.headers().clone();
        interceptor.apply(&mut request, &session).unwrap();

        assert_eq!(&first, request.headers());
        assert_eq!(request.headers().get_all(AUTHORIZATION).iter().count(), 1);
    }

    #[test]
    fn test_refresh_header_opt_in() {
        let session = session_with(Some(CredentialPair::new("A1", "R1")));
        let mut config = ClientConfig::default();

        let mut request = ApiRequest::get("/members");
        RequestInterceptor::from_config(&config)
            .unwrap()
            .apply(&mut request, &session)
            .unwrap();
        assert!(request.headers().get("x-refresh-token").is_none());

        config.send_refresh_header = true;
        RequestInterceptor::from_config(&config)
            .unwrap()
            .apply(&mut request, &session)
            .unwrap();
        assert_eq!(request.headers()["x-refresh-token"], "Bearer R1");
    }

    #[test]
    fn test_unauthenticated_strips_stale_header() {
        let session = session_with(Some(CredentialPair::new("A1", "R1")));
        let interceptor = RequestInterceptor::default();
        let mut request = ApiRequest::get("/members");

        interceptor.apply(&mut request, &session).unwrap();
        session.clear().unwrap();
        let attached = interceptor.apply(&mut request, &session).unwrap();

        assert_eq!(attached, None);
        assert!(request.headers().get(AUTHORIZATION).is_none());
    }

    #[test]
    fn test_store_error_rejects_request() {
        let mut store = MockTokenStore::new();
        store
            .expect_get()
            .returning(|_| Err(StoreError::Unavailable("private mode".into())));
        let session = Session::new(Arc::new(store));
        let mut request = ApiRequest::get("/members");

        let result = RequestInterceptor::default().apply(&mut request, &session);

        assert!(matches!(
            result,
            Err(ClientError::Store(StoreError::Unavailable(_)))
        ));
    }

    #[test]
    fn test_invalid_token_is_rejected() {
        let session = session_with(Some(CredentialPair::new("bad\ntoken", "R1")));
        let mut request = ApiRequest::get("/members");

        let result = RequestInterceptor::default().apply(&mut request, &session);
        assert!(matches!(result, Err(ClientError::InvalidCredential(_))));
    }

    #[test]
    fn test_method_shorthands() {
        assert_eq!(ApiRequest::get("/members").method(), &Method::GET);
        assert_eq!(ApiRequest::post("/members").method(), &Method::POST);
        assert_eq!(ApiRequest::put("/members/1").method(), &Method::PUT);
        assert_eq!(ApiRequest::patch("/members/1").method(), &Method::PATCH);
        assert_eq!(ApiRequest::delete("/members/1").method(), &Method::DELETE);

        let request = ApiRequest::new(Method::GET, "/packages").query("page", "2");
        assert_eq!(request.path(), "/packages");
        assert_eq!(request.query_pairs(), &[("page".to_string(), "2".to_string())]);
    }

    #[test]
    fn test_retry_flag_is_single_shot() {
        let mut request = ApiRequest::post("/checkins").json(serde_json::json!({ "token": "qr" }));
        assert!(request.can_refresh());
        request.mark_retried();
        assert!(request.is_retried());
        assert!(!request.can_refresh());

        assert!(!ApiRequest::post("/auth/login").without_refresh().can_refresh());
    }
}
