//! Configuration for the session client

use crate::error::{ClientError, Result};
use reqwest::header::HeaderName;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable prefix, e.g. `STAGPOWER_API_URL`
pub const ENV_PREFIX: &str = "STAGPOWER";

/// Prefix of the variables the web frontend is built with, e.g. `REACT_APP_API_URL`
///
/// Only `api_url` and `api_prefix` are read from it; `STAGPOWER_*` wins when both are set.
pub const FRONTEND_ENV_PREFIX: &str = "REACT_APP";

/// Session client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the REST API
    pub api_url: String,

    /// Path prefix every endpoint lives under
    pub api_prefix: String,

    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,

    /// Also send the refresh token on every request
    pub send_refresh_header: bool,

    /// Header carrying the refresh token when `send_refresh_header` is set
    pub refresh_header: String,

    /// Login entry point announced when the session cannot be recovered
    pub login_path: String,

    /// User agent sent with every request
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8080".to_string(),
            api_prefix: "/api/v1".to_string(),
            timeout_ms: 10_000,
            send_refresh_header: false,
            refresh_header: "x-refresh-token".to_string(),
            login_path: "/login".to_string(),
            user_agent: concat!("stagpower-session/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ClientConfig {
    /// Create a configuration pointing at `api_url` with all other values defaulted
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            ..Self::default()
        }
    }

    /// Load configuration with defaults and environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables cannot be parsed or the result is invalid
    pub fn from_env() -> Result<Self> {
        Self::load(None, env_sources(None))
    }

    /// Load configuration from file, overlaid with environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed or the result is invalid
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load(Some(path.as_ref()), env_sources(None))
    }

    fn load(file: Option<&Path>, env: Vec<config::Environment>) -> Result<Self> {
        let defaults = Self::default();

        let mut builder = config::Config::builder()
            .set_default("api_url", defaults.api_url)
            .and_then(|b| b.set_default("api_prefix", defaults.api_prefix))
            .and_then(|b| b.set_default("timeout_ms", defaults.timeout_ms))
            .and_then(|b| b.set_default("send_refresh_header", defaults.send_refresh_header))
            .and_then(|b| b.set_default("refresh_header", defaults.refresh_header))
            .and_then(|b| b.set_default("login_path", defaults.login_path))
            .and_then(|b| b.set_default("user_agent", defaults.user_agent))
            .map_err(config_error)?;

        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path));
        }

        for source in env {
            builder = builder.add_source(source);
        }

        let settings = builder.build().map_err(config_error)?;
        let config: Self = settings.try_deserialize().map_err(config_error)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Configuration` describing the first invalid field
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.api_url)
            .map_err(|e| ClientError::Configuration(format!("api_url: invalid URL - {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ClientError::Configuration(format!(
                "api_url: unsupported scheme '{}'",
                url.scheme()
            )));
        }

        if !self.api_prefix.is_empty() && !self.api_prefix.starts_with('/') {
            return Err(ClientError::Configuration(
                "api_prefix: must be empty or start with '/'".into(),
            ));
        }

        if self.timeout_ms == 0 {
            return Err(ClientError::Configuration(
                "timeout_ms: must be greater than zero".into(),
            ));
        }

        HeaderName::from_bytes(self.refresh_header.as_bytes()).map_err(|e| {
            ClientError::Configuration(format!("refresh_header: invalid header name - {e}"))
        })?;

        Ok(())
    }

    /// Per-request timeout
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Absolute URL for an endpoint path below the API prefix
    pub fn endpoint(&self, path: &str) -> String {
        let base = self.api_url.trim_end_matches('/');
        let prefix = self.api_prefix.trim_matches('/');
        let path = path.trim_start_matches('/');

        if prefix.is_empty() {
            format!("{base}/{path}")
        } else {
            format!("{base}/{prefix}/{path}")
        }
    }
}

/// Frontend variables carried over; every other `REACT_APP_*` variable is ignored
const FRONTEND_ENV_KEYS: [&str; 2] = ["REACT_APP_API_URL", "REACT_APP_API_PREFIX"];

/// Environment sources in increasing precedence; `vars` stands in for the process environment
fn env_sources(vars: Option<&config::Map<String, String>>) -> Vec<config::Environment> {
    let frontend: config::Map<String, String> = FRONTEND_ENV_KEYS
        .iter()
        .filter_map(|key| {
            let value = match vars {
                Some(vars) => vars.get(*key).cloned(),
                None => std::env::var(key).ok(),
            };
            value.map(|value| ((*key).to_string(), value))
        })
        .collect();

    vec![
        config::Environment::with_prefix(FRONTEND_ENV_PREFIX).source(Some(frontend)),
        config::Environment::with_prefix(ENV_PREFIX)
            .try_parsing(true)
            .source(vars.cloned()),
    ]
}

fn config_error(err: config::ConfigError) -> ClientError {
    ClientError::Configuration(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env(vars: &[(&str, &str)]) -> Vec<config::Environment> {
        let map: config::Map<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        env_sources(Some(&map))
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::load(None, env(&[])).unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert!(!config.send_refresh_header);
    }

    #[test]
    fn test_env_overrides() {
        let config = ClientConfig::load(
            None,
            env(&[
                ("STAGPOWER_API_URL", "https://api.stagpower.vn"),
                ("STAGPOWER_API_PREFIX", "/v2"),
                ("STAGPOWER_TIMEOUT_MS", "2500"),
                ("STAGPOWER_SEND_REFRESH_HEADER", "true"),
            ]),
        )
        .unwrap();

        assert_eq!(config.api_url, "https://api.stagpower.vn");
        assert_eq!(config.api_prefix, "/v2");
        assert_eq!(config.timeout_ms, 2500);
        assert!(config.send_refresh_header);
        assert_eq!(config.login_path, "/login");
    }

    #[test]
    fn test_frontend_env_names() {
        let config = ClientConfig::load(
            None,
            env(&[
                ("REACT_APP_API_URL", "https://gym.stagpower.vn"),
                ("REACT_APP_API_PREFIX", "/api"),
                ("REACT_APP_TIMEOUT_MS", "1"),
            ]),
        )
        .unwrap();

        assert_eq!(config.api_url, "https://gym.stagpower.vn");
        assert_eq!(config.api_prefix, "/api");
        assert_eq!(config.timeout_ms, 10_000);
    }

    #[test]
    fn test_own_env_names_win_over_frontend() {
        let config = ClientConfig::load(
            None,
            env(&[
                ("REACT_APP_API_URL", "https://gym.stagpower.vn"),
                ("STAGPOWER_API_URL", "https://api.stagpower.vn"),
            ]),
        )
        .unwrap();

        assert_eq!(config.api_url, "https://api.stagpower.vn");
    }

    #[test]
    fn test_file_then_env() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "api_url = \"https://file.example\"\ntimeout_ms = 500").unwrap();

        let config = ClientConfig::load(
            Some(file.path()),
            env(&[("STAGPOWER_TIMEOUT_MS", "750")]),
        )
        .unwrap();

        assert_eq!(config.api_url, "https://file.example");
        assert_eq!(config.timeout_ms, 750);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = ClientConfig::new("not a url");
        assert!(matches!(config.validate(), Err(ClientError::Configuration(_))));

        config = ClientConfig::new("ftp://example.com");
        assert!(config.validate().is_err());

        config = ClientConfig::default();
        config.api_prefix = "api".into();
        assert!(config.validate().is_err());

        config = ClientConfig::default();
        config.timeout_ms = 0;
        assert!(config.validate().is_err());

        config = ClientConfig::default();
        config.refresh_header = "bad header".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_endpoint_joining() {
        let mut config = ClientConfig::new("http://localhost:8080/");
        assert_eq!(
            config.endpoint("/auth/login"),
            "http://localhost:8080/api/v1/auth/login"
        );

        config.api_prefix = "/api/".into();
        assert_eq!(config.endpoint("members"), "http://localhost:8080/api/members");

        config.api_prefix = String::new();
        assert_eq!(config.endpoint("/auth/refresh"), "http://localhost:8080/auth/refresh");
    }
}
