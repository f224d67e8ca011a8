//! Request intake.
//!
//! # Responsibilities
//! - Assign a request ID (UUID v4) as early as possible for tracing
//! - Buffer the inbound body under the configured size limit
//! - Convert an axum request into an owned `InboundRequest`
//!
//! # Design Decisions
//! - The ID is set by `SetRequestIdLayer` and echoed back by
//!   `PropagateRequestIdLayer`; handlers only read it
//! - Oversized bodies are rejected before classification

use axum::body::{Body, Bytes};
use axum::http::{header, request::Parts, HeaderMap};
use http_body_util::LengthLimitError;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

use crate::error::{ProxyError, Target};
use crate::forward::InboundRequest;

pub use crate::forward::transcode::X_REQUEST_ID;

/// Layer that assigns an ID to requests lacking one.
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid)
}

/// Layer that copies the request ID onto the response.
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(X_REQUEST_ID)
}

/// The request ID, or "unknown" outside the request ID layers.
pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

/// An `InboundRequest` with an empty body, from request parts.
pub fn inbound_from_parts(parts: &Parts) -> InboundRequest {
    InboundRequest {
        method: parts.method.clone(),
        path: parts.uri.path().to_string(),
        query: parts.uri.query().map(str::to_string),
        headers: parts.headers.clone(),
        body: Bytes::new(),
    }
}

/// Read the whole body, failing with `BodyTooLarge` beyond `limit` bytes.
pub async fn read_body(body: Body, limit: usize, headers: &HeaderMap, target: &Target) -> Result<Bytes, ProxyError> {
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|len| len > limit) {
        return Err(ProxyError::BodyTooLarge {
            limit,
            target: target.clone(),
        });
    }

    axum::body::to_bytes(body, limit).await.map_err(|e| {
        let inner = e.into_inner();
        if inner.is::<LengthLimitError>() {
            ProxyError::BodyTooLarge {
                limit,
                target: target.clone(),
            }
        } else {
            ProxyError::InvalidInboundBody {
                message: format!("failed to read request body: {}", inner),
                target: target.clone(),
            }
        }
    })
}

/// First characters of an Authorization value, safe to log.
pub fn redact_credential(value: &str) -> String {
    let visible: String = value.chars().take(12).collect();
    if visible.len() < value.len() {
        format!("{}...", visible)
    } else {
        visible
    }
}
