//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check the upstream base URL is an absolute http(s) URL
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::ProxyConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address `{0}` is not a socket address")]
    BindAddress(String),

    #[error("upstream.base_url `{0}` is not an absolute http(s) URL")]
    BaseUrl(String),

    #[error("upstream.api_prefix `{0}` must start with '/' and name a segment")]
    ApiPrefix(String),

    #[error("timeout `{0}` must be greater than zero")]
    ZeroTimeout(String),

    #[error("routing.collections entry `{0}` must be a single non-empty path segment")]
    Collection(String),

    #[error("limits.max_body_size must be greater than zero")]
    ZeroBodyLimit,

    #[error("observability.metrics_address `{0}` is not a socket address")]
    MetricsAddress(String),
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    match Url::parse(&config.upstream.base_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {}
        _ => errors.push(ValidationError::BaseUrl(config.upstream.base_url.clone())),
    }

    let prefix = &config.upstream.api_prefix;
    if !prefix.starts_with('/') || prefix.trim_end_matches('/').is_empty() {
        errors.push(ValidationError::ApiPrefix(config.upstream.api_prefix.clone()));
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("connect_secs".into()));
    }
    if config.timeouts.default_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("default_secs".into()));
    }
    for (route, secs) in &config.timeouts.routes {
        if *secs == 0 {
            errors.push(ValidationError::ZeroTimeout(format!("routes.{}", route)));
        }
    }

    for name in &config.routing.collections {
        if name.is_empty() || name.contains('/') {
            errors.push(ValidationError::Collection(name.clone()));
        }
    }

    if config.limits.max_body_size == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
