//! Response relay.
//!
//! # Responsibilities
//! - Relay the upstream status, headers and body to the caller
//! - Validate bodies declared as JSON before relaying them
//! - Apply the empty-body policy
//!
//! # Design Decisions
//! - Valid JSON is relayed byte-for-byte, not re-serialized
//! - Non-JSON bodies (text, binary) pass through untouched
//! - The upstream's own CORS and hop-by-hop headers are dropped
//! - The processing-marker translation lives in one function,
//!   `empty_body_response`, gated by `relay.empty_server_error_as_processing`

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::config::RelayConfig;
use crate::error::{ProxyError, Target};
use crate::forward::types::UpstreamResponse;

const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Turn an upstream response into the caller-facing response.
pub fn relay(upstream: UpstreamResponse, target: &Target, config: &RelayConfig) -> Result<Response, ProxyError> {
    let content_type = upstream.content_type();
    let declared_json = content_type.as_deref().is_some_and(|ct| ct.contains("application/json"));

    let empty = upstream.body.iter().all(u8::is_ascii_whitespace);
    if empty && (declared_json || content_type.is_none()) && !relays_empty_as_is(&upstream, target) {
        return Ok(empty_body_response(upstream.status, target, config));
    }

    if declared_json {
        if let Err(e) = serde_json::from_slice::<serde_json::Value>(&upstream.body) {
            let preview = preview(&upstream.body, config.preview_bytes);
            tracing::warn!(
                method = %target.method,
                url = %target.url,
                status = upstream.status.as_u16(),
                preview = %preview,
                "Upstream declared JSON but sent an unparsable body"
            );
            return Err(ProxyError::MalformedUpstreamBody {
                message: e.to_string(),
                status: upstream.status.as_u16(),
                preview,
                target: target.clone(),
            });
        }
    }

    tracing::debug!(
        url = %target.url,
        preview = %preview(&upstream.body, config.preview_bytes),
        "Relaying upstream body"
    );

    let headers = relayed_headers(&upstream.headers);
    Ok((upstream.status, headers, Body::from(upstream.body)).into_response())
}

/// Empty answers that are complete as they are: no-content statuses, HEAD
/// responses, and untyped 2xx acknowledgements such as an empty DELETE 200.
fn relays_empty_as_is(upstream: &UpstreamResponse, target: &Target) -> bool {
    matches!(upstream.status, StatusCode::NO_CONTENT | StatusCode::NOT_MODIFIED)
        || target.method == "HEAD"
        || (upstream.content_type().is_none() && upstream.status.is_success())
}

/// Policy for an upstream answer with no body.
///
/// The upstream answers a resource that is still being generated with an
/// empty 5xx; that becomes a 200 carrying `processing: true`. Any other
/// empty answer is reported as not found.
pub fn empty_body_response(status: StatusCode, target: &Target, config: &RelayConfig) -> Response {
    if status.is_server_error() {
        if config.empty_server_error_as_processing {
            tracing::info!(
                url = %target.url,
                upstream_status = status.as_u16(),
                "Empty upstream server error treated as still processing"
            );
            let body = json!({
                "processing": true,
                "status": "processing",
                "message": "The upstream is still generating this resource",
                "upstream_status": status.as_u16(),
            });
            return (StatusCode::OK, Json(body)).into_response();
        }

        let body = json!({
            "error": "upstream returned an empty response",
            "kind": "empty_upstream_body",
            "url": target.url,
            "method": target.method,
            "upstream_status": status.as_u16(),
        });
        return (status, Json(body)).into_response();
    }

    tracing::info!(
        url = %target.url,
        upstream_status = status.as_u16(),
        "Empty upstream response treated as not found"
    );
    let body = json!({
        "error": "not found",
        "kind": "not_found",
        "url": target.url,
        "method": target.method,
        "upstream_status": status.as_u16(),
    });
    (StatusCode::NOT_FOUND, Json(body)).into_response()
}

/// Upstream headers worth relaying.
pub fn relayed_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in upstream {
        if HOP_BY_HOP.contains(name)
            || name == header::CONTENT_LENGTH
            || name.as_str().starts_with("access-control-")
        {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers
}

/// At most `max_chars` characters of a body, lossily decoded.
pub fn preview(body: &[u8], max_chars: usize) -> String {
    String::from_utf8_lossy(body).chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;
    use axum::http::HeaderValue;

    fn upstream(status: u16, content_type: Option<&'static str>, body: &'static [u8]) -> UpstreamResponse {
        let mut headers = HeaderMap::new();
        if let Some(ct) = content_type {
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(ct));
        }
        UpstreamResponse {
            status: StatusCode::from_u16(status).unwrap(),
            headers,
            body: Bytes::from_static(body),
        }
    }

    fn target() -> Target {
        Target::new("GET", "https://app.veez.ai/api/product/abc123")
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_json_is_relayed_verbatim() {
        let raw: &'static [u8] = br#"{"id":"abc123","status":"ready"}"#;
        let response = relay(upstream(201, Some("application/json"), raw), &target(), &RelayConfig::default()).unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], raw);
    }

    #[tokio::test]
    async fn test_json_error_status_is_preserved() {
        let response = relay(
            upstream(422, Some("application/json; charset=utf-8"), br#"{"detail":"bad"}"#),
            &target(),
            &RelayConfig::default(),
        )
        .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body_json(response).await["detail"], "bad");
    }

    #[tokio::test]
    async fn test_empty_server_error_means_processing() {
        let response = relay(upstream(500, None, b""), &target(), &RelayConfig::default()).unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["processing"], true);
        assert_eq!(body["upstream_status"], 500);
    }

    #[tokio::test]
    async fn test_processing_policy_can_be_disabled() {
        let config = RelayConfig {
            empty_server_error_as_processing: false,
            ..RelayConfig::default()
        };
        let response = relay(upstream(500, Some("application/json"), b""), &target(), &config).unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["kind"], "empty_upstream_body");
    }

    #[tokio::test]
    async fn test_empty_body_is_not_found() {
        let response = relay(upstream(404, Some("application/json"), b""), &target(), &RelayConfig::default()).unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["error"], "not found");
        assert_eq!(body["url"], "https://app.veez.ai/api/product/abc123");
    }

    #[tokio::test]
    async fn test_untyped_empty_success_keeps_status() {
        let put = Target::new("PUT", "https://app.veez.ai/api/product/abc123");
        let response = relay(upstream(201, None, b""), &put, &RelayConfig::default()).unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.is_empty());

        let delete = Target::new("DELETE", "https://app.veez.ai/api/product/abc123");
        let response = relay(upstream(200, None, b""), &delete, &RelayConfig::default()).unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_head_response_is_relayed() {
        let head = Target::new("HEAD", "https://app.veez.ai/api/product/abc123");
        let response = relay(upstream(200, Some("application/json"), b""), &head, &RelayConfig::default()).unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");

        let response = relay(upstream(500, None, b""), &head, &RelayConfig::default()).unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_no_content_is_relayed() {
        let response = relay(upstream(204, None, b""), &target(), &RelayConfig::default()).unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        let err = relay(
            upstream(200, Some("application/json"), b"<html>oops</html>"),
            &target(),
            &RelayConfig::default(),
        )
        .unwrap_err();
        let ProxyError::MalformedUpstreamBody { preview, status, .. } = err else {
            panic!("expected malformed body error");
        };
        assert_eq!(preview, "<html>oops</html>");
        assert_eq!(status, 200);
    }

    #[tokio::test]
    async fn test_text_is_passed_through() {
        let response = relay(upstream(200, Some("text/plain"), b"hello"), &target(), &RelayConfig::default()).unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"hello");
    }

    #[test]
    fn test_relayed_headers_filter() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("image/png"));
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("4"));
        headers.insert(header::CONNECTION, HeaderValue::from_static("close"));
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("https://app.veez.ai"));
        headers.insert("x-upstream", HeaderValue::from_static("1"));

        let relayed = relayed_headers(&headers);
        assert_eq!(relayed.len(), 2);
        assert_eq!(relayed[header::CONTENT_TYPE], "image/png");
        assert_eq!(relayed["x-upstream"], "1");
    }

    #[test]
    fn test_preview_is_char_bounded() {
        assert_eq!(preview("héllo".as_bytes(), 2), "hé");
        assert_eq!(preview(b"abc", 300), "abc");
    }
}
