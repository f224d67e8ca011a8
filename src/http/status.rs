//! Informational endpoints: the HTML index, liveness JSON and the 404 fallback.

use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    extract::State,
    http::{StatusCode, Uri},
    response::{Html, IntoResponse},
    Json,
};
use serde::Serialize;

use crate::http::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
    pub timestamp: u64,
    pub token_configured: bool,
    pub upstream: String,
    pub endpoints: Vec<String>,
}

/// `GET /test` and `GET /health`.
pub async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    let config = state.forwarder.config();
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();

    Json(HealthStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timestamp,
        token_configured: config.upstream.has_token(),
        upstream: config.upstream.base_url.clone(),
        endpoints: collection_paths(&state),
    })
}

/// `GET /`: a human-readable status page.
pub async fn index(State(state): State<AppState>) -> Html<String> {
    let config = state.forwarder.config();
    let endpoints: String = collection_paths(&state)
        .iter()
        .map(|path| format!("<li><code>GET|POST {}</code></li>", path))
        .collect();

    Html(format!(
        "<!doctype html>\n<html>\n<head><title>Veez.ai proxy</title></head>\n<body>\n\
         <h1>Veez.ai proxy</h1>\n\
         <p>Forwarding <code>{prefix}/*</code> to <code>{upstream}</code>.</p>\n\
         <p>Token configured: {token}</p>\n\
         <h2>Endpoints</h2>\n<ul>{endpoints}</ul>\n\
         <p>Liveness: <a href=\"/health\">/health</a></p>\n\
         </body>\n</html>\n",
        prefix = config.upstream.api_prefix.trim_end_matches('/'),
        upstream = config.upstream.base_url,
        token = if config.upstream.has_token() { "yes" } else { "no" },
        endpoints = endpoints,
    ))
}

/// Anything that is neither informational nor under the API prefix.
pub async fn not_found(uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({
            "error": "not found",
            "path": uri.path(),
        })),
    )
}

fn collection_paths(state: &AppState) -> Vec<String> {
    let config = state.forwarder.config();
    let prefix = config.upstream.api_prefix.trim_end_matches('/');
    config
        .routing
        .collections
        .iter()
        .map(|name| format!("{}/{}/", prefix, name))
        .collect()
}
