//! CLI commands

use anyhow::{Context as _, Result, anyhow};
use clap::Subcommand;
use serde_json::Value;
use stagpower_session::{ApiRequest, FileTokenStore, Method, SessionClient, SessionEvent};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config;

/// Name of the token file inside the data directory
const SESSION_FILE: &str = "session.json";

/// Settings shared by every command
pub struct Context {
    pub data_dir: PathBuf,
    pub config_file: Option<PathBuf>,
    pub api_url: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Log in and store the issued tokens
    Login {
        /// Account email
        #[arg(long, env = "STAGPOWER_EMAIL")]
        email: String,

        /// Account password
        #[arg(long, env = "STAGPOWER_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Revoke the refresh token and forget the stored session
    Logout,

    /// Show whether a session is stored
    Status,

    /// Exchange the stored refresh token for a new pair
    Refresh,

    /// Send an authenticated request and print the JSON response
    Request {
        /// HTTP method, e.g. GET or POST
        method: String,

        /// Endpoint path below the API prefix, e.g. /members
        path: String,

        /// JSON request body
        #[arg(long)]
        data: Option<String>,

        /// Query parameter as key=value (repeatable)
        #[arg(short = 'q', long = "query", value_parser = parse_query_pair)]
        query: Vec<(String, String)>,
    },

    /// Client configuration files
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Generate a client configuration file with default values
    Init {
        /// Output file path (defaults to STAGPOWER_STATE_DIR/client.json)
        output: Option<PathBuf>,
    },

    /// Print the effective configuration
    Show,
}

impl Commands {
    pub async fn execute(self, context: Context) -> Result<()> {
        if let Self::Config { command } = self {
            return command.execute(&context);
        }

        let client = build_client(&context)?;
        let watcher = watch_events(&client);

        let result = self.run(&client, &context).await;

        // dropping the last sender closes the channel and lets the watcher drain
        drop(client);
        let _ = watcher.await;

        result
    }

    async fn run(self, client: &SessionClient, context: &Context) -> Result<()> {
        match self {
            Self::Login { email, password } => {
                let response = client.login(email, password).await?;
                info!("Logged in");
                println!("{}", serde_json::to_string_pretty(&response.user)?);
                Ok(())
            }
            Self::Logout => {
                client.logout().await?;
                println!("Logged out");
                Ok(())
            }
            Self::Status => {
                match client.session().credentials()? {
                    Some(pair) => println!(
                        "Logged in (access token {}, refresh token {})",
                        mask(&pair.access_token),
                        mask(&pair.refresh_token)
                    ),
                    None => println!("Not logged in"),
                }
                Ok(())
            }
            Self::Refresh => {
                let pair = client.refresh().await?;
                println!("Session refreshed (access token {})", mask(&pair.access_token));
                Ok(())
            }
            Self::Request {
                method,
                path,
                data,
                query,
            } => {
                let request = build_request(&method, path, data.as_deref(), query)?;
                let body = client.execute_json(request).await?;
                println!("{}", serde_json::to_string_pretty(&body)?);
                Ok(())
            }
            Self::Config { command } => command.execute(context),
        }
    }
}

impl ConfigCommands {
    pub fn execute(self, context: &Context) -> Result<()> {
        match self {
            Self::Init { output } => {
                let config_path = output.unwrap_or_else(|| context.data_dir.join("client.json"));

                if let Some(parent) = config_path.parent() {
                    std::fs::create_dir_all(parent)?;
                }

                config::generate_default_config(&config_path)?;
                println!(
                    "Generated client configuration at: {}",
                    config_path.display()
                );
                Ok(())
            }
            Self::Show => {
                let config = config::load_client_config(
                    context.config_file.as_deref(),
                    context.api_url.as_deref(),
                )?;
                println!("{}", serde_json::to_string_pretty(&config)?);
                Ok(())
            }
        }
    }
}

fn build_client(context: &Context) -> Result<SessionClient> {
    let config =
        config::load_client_config(context.config_file.as_deref(), context.api_url.as_deref())?;
    let session_file = context.data_dir.join(SESSION_FILE);
    debug!("Using session file {}", session_file.display());

    Ok(SessionClient::builder()
        .config(config)
        .token_store(Arc::new(FileTokenStore::new(session_file)))
        .build()?)
}

fn watch_events(client: &SessionClient) -> JoinHandle<()> {
    let mut rx = client.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(SessionEvent::SessionExpired { login_path }) => {
                    warn!(
                        "Session expired ({login_path}); run `stagpower login` to sign in again"
                    );
                }
                Ok(SessionEvent::PermissionDenied { path }) => {
                    warn!("Permission denied for {path}");
                }
                Ok(SessionEvent::ServerError { status, path }) => {
                    warn!("Server error {status} for {path}");
                }
                Ok(event) => debug!("Session event: {event:?}"),
                Err(RecvError::Lagged(missed)) => warn!("Missed {missed} session events"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn build_request(
    method: &str,
    path: String,
    data: Option<&str>,
    query: Vec<(String, String)>,
) -> Result<ApiRequest> {
    let method = reqwest_method(method)?;
    let mut request = ApiRequest::new(method, path);

    for (key, value) in query {
        request = request.query(key, value);
    }

    if let Some(data) = data {
        let body: Value = serde_json::from_str(data).context("--data is not valid JSON")?;
        request = request.json(body);
    }

    Ok(request)
}

fn reqwest_method(method: &str) -> Result<Method> {
    Method::from_bytes(method.to_uppercase().as_bytes())
        .map_err(|_| anyhow!("invalid HTTP method: {method}"))
}

fn parse_query_pair(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))
}

fn mask(token: &str) -> String {
    let visible: String = token.chars().take(6).collect();
    format!("{visible}…")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_request() {
        let request = build_request(
            "post",
            "/checkins".to_string(),
            Some(r#"{"token":"qr-123"}"#),
            vec![("branch".into(), "hcm-1".into())],
        )
        .unwrap();

        assert_eq!(request.method().as_str(), "POST");
        assert_eq!(request.path(), "/checkins");
        assert_eq!(request.body().unwrap()["token"], "qr-123");
        assert_eq!(
            request.query_pairs(),
            &[("branch".to_string(), "hcm-1".to_string())]
        );
    }

    #[test]
    fn test_build_request_rejects_bad_input() {
        assert!(build_request("GET", "/x".into(), Some("{oops"), vec![]).is_err());
        assert!(build_request("NOT A METHOD", "/x".into(), None, vec![]).is_err());
    }

    #[test]
    fn test_parse_query_pair() {
        assert_eq!(
            parse_query_pair("page=2").unwrap(),
            ("page".to_string(), "2".to_string())
        );
        assert!(parse_query_pair("page").is_err());
    }

    #[test]
    fn test_mask() {
        assert_eq!(mask("eyJhbGciOiJIUzI1NiJ9"), "eyJhbG…");
        assert_eq!(mask("abc"), "abc…");
    }
}
