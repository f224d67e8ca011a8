//! Error taxonomy for a single forwarded request.
//!
//! Every variant carries the method and URL that failed so the caller and
//! the logs can tell which call went wrong. Each one renders as a JSON
//! object with at least an `error` field.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Method and URL of the call an error belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub method: String,
    pub url: String,
}

impl Target {
    pub fn new(method: impl ToString, url: impl Into<String>) -> Self {
        Self {
            method: method.to_string(),
            url: url.into(),
        }
    }
}

/// Errors that end a request without a relayed upstream response.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The caller sent a body that does not match its declared content type.
    #[error("invalid request body: {message}")]
    InvalidInboundBody { message: String, target: Target },

    /// The caller sent more than `limits.max_body_size` bytes.
    #[error("request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize, target: Target },

    /// Connection to the upstream failed.
    #[error("upstream unreachable: {message}")]
    UpstreamUnreachable { message: String, target: Target },

    /// The upstream did not answer within the route's deadline.
    #[error("upstream timed out: {message}")]
    UpstreamTimeout { message: String, target: Target },

    /// The upstream declared JSON but sent something unparsable.
    #[error("upstream returned malformed JSON: {message}")]
    MalformedUpstreamBody {
        message: String,
        status: u16,
        preview: String,
        target: Target,
    },
}

impl ProxyError {
    /// Stable machine-readable name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::InvalidInboundBody { .. } => "invalid_inbound_body",
            ProxyError::BodyTooLarge { .. } => "body_too_large",
            ProxyError::UpstreamUnreachable { .. } => "upstream_unreachable",
            ProxyError::UpstreamTimeout { .. } => "upstream_timeout",
            ProxyError::MalformedUpstreamBody { .. } => "malformed_upstream_body",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::InvalidInboundBody { .. } => StatusCode::BAD_REQUEST,
            ProxyError::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ProxyError::UpstreamUnreachable { .. }
            | ProxyError::UpstreamTimeout { .. }
            | ProxyError::MalformedUpstreamBody { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn target(&self) -> &Target {
        match self {
            ProxyError::InvalidInboundBody { target, .. }
            | ProxyError::BodyTooLarge { target, .. }
            | ProxyError::UpstreamUnreachable { target, .. }
            | ProxyError::UpstreamTimeout { target, .. }
            | ProxyError::MalformedUpstreamBody { target, .. } => target,
        }
    }

    /// True when the failure happened before any upstream call.
    pub fn is_caller_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let target = self.target();
        let mut body = json!({
            "error": self.to_string(),
            "kind": self.kind(),
            "url": target.url,
            "method": target.method,
        });
        if let ProxyError::MalformedUpstreamBody {
            status: upstream_status,
            preview,
            ..
        } = &self
        {
            body["upstream_status"] = json!(upstream_status);
            body["preview"] = json!(preview);
        }
        (status, Json(body)).into_response()
    }
}
