//! CLI configuration utilities

use anyhow::Result;
use stagpower_session::ClientConfig;
use std::path::Path;

/// Load the client configuration: file (if any) and environment, then CLI overrides
pub fn load_client_config(config_file: Option<&Path>, api_url: Option<&str>) -> Result<ClientConfig> {
    let mut config = match config_file {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            ClientConfig::from_file(path)?
        }
        None => ClientConfig::from_env()?,
    };

    if let Some(url) = api_url {
        config.api_url = url.to_string();
        config.validate()?;
    }

    Ok(config)
}

/// Save client configuration to JSON file
pub fn save_client_config<P: AsRef<Path>>(config: &ClientConfig, path: P) -> Result<()> {
    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Generate a default configuration file
pub fn generate_default_config<P: AsRef<Path>>(path: P) -> Result<()> {
    save_client_config(&ClientConfig::default(), path)
}
