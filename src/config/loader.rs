//! Configuration loading from disk and the process environment.

use std::fs;
use std::net::SocketAddr;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::config::validation::ValidationError;

/// Environment variable overriding the listen port.
pub const ENV_PORT: &str = "PORT";
/// Environment variable carrying the proxy-held bearer token.
pub const ENV_TOKEN: &str = "VEEZ_TOKEN";
/// Environment variable overriding the upstream base URL.
pub const ENV_BASE_URL: &str = "VEEZ_BASE_URL";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid {name}: {value}")]
    Env { name: &'static str, value: String },

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse a configuration from a TOML file, without validating it.
pub fn read_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: ProxyConfig = toml::from_str(&content)?;
    Ok(config)
}


/// Apply `PORT`, `VEEZ_TOKEN` and `VEEZ_BASE_URL` on top of a config.
///
/// `lookup` abstracts over the environment so tests don't mutate the process.
pub fn apply_env_overrides<F>(config: &mut ProxyConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(port) = lookup(ENV_PORT) {
        let port: u16 = port.trim().parse().map_err(|_| ConfigError::Env {
            name: ENV_PORT,
            value: port.clone(),
        })?;
        set_port(config, port);
    }

    if let Some(token) = lookup(ENV_TOKEN) {
        config.upstream.token = token;
    }

    if let Some(base_url) = lookup(ENV_BASE_URL) {
        config.upstream.base_url = base_url;
    }

    Ok(())
}

/// Replace the port of the listener address, keeping its host.
pub fn set_port(config: &mut ProxyConfig, port: u16) {
    config.listener.bind_address = match config.listener.bind_address.parse::<SocketAddr>() {
        Ok(mut addr) => {
            addr.set_port(port);
            addr.to_string()
        }
        Err(_) => format!("0.0.0.0:{}", port),
    };
}
