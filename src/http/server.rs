//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with all handlers
//! - Wire up middleware (CORS, request ID, tracing)
//! - Buffer inbound requests and hand them to the forwarder
//! - Serve until the shutdown signal, then drain

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware,
    response::{IntoResponse, Response},
    routing::{any, get},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::ProxyConfig;
use crate::forward::{Dispatcher, Forwarder};
use crate::http::middleware::cors_middleware;
use crate::http::request::{
    inbound_from_parts, propagate_request_id_layer, read_body, redact_credential, request_id,
    set_request_id_layer,
};
use crate::http::status;
use crate::lifecycle::shutdown;
use crate::observability::metrics;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub forwarder: Arc<Forwarder>,
}

/// HTTP server for the forwarding proxy.
pub struct HttpServer {
    router: Router,
    config: Arc<ProxyConfig>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ProxyConfig) -> Result<Self, reqwest::Error> {
        let dispatcher = Dispatcher::new(Duration::from_secs(config.timeouts.connect_secs))?;
        Ok(Self::with_dispatcher(config, dispatcher))
    }

    /// Create a server around an existing upstream client.
    pub fn with_dispatcher(config: ProxyConfig, dispatcher: Dispatcher) -> Self {
        let config = Arc::new(config);
        let state = AppState {
            forwarder: Arc::new(Forwarder::new(config.clone(), dispatcher)),
        };
        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        let prefix = config.upstream.api_prefix.trim_end_matches('/');

        Router::new()
            .route("/", get(status::index))
            .route("/test", get(status::health))
            .route("/health", get(status::health))
            .route(&format!("{}/{{*path}}", prefix), any(proxy_handler))
            .route(&format!("{}/", prefix), any(proxy_handler))
            .route(prefix, any(proxy_handler))
            .fallback(status::not_found)
            .with_state(state)
            .layer(middleware::from_fn(cors_middleware))
            .layer(
                ServiceBuilder::new()
                    .layer(set_request_id_layer())
                    .layer(TraceLayer::new_for_http())
                    .layer(propagate_request_id_layer()),
            )
    }

    /// The fully layered router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires.
    pub async fn run(self, listener: TcpListener, shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.base_url,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown::wait(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Forward one `/api/*` request upstream.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let (parts, body) = request.into_parts();
    let request_id = request_id(&parts.headers);
    let method = parts.method.to_string();

    let mut inbound = inbound_from_parts(&parts);
    let target = state.forwarder.target(&inbound);

    tracing::info!(
        request_id = %request_id,
        method = %method,
        path = %inbound.path_and_query(),
        url = %target.url,
        origin = parts.headers.get(header::ORIGIN).and_then(|v| v.to_str().ok()).unwrap_or("no-origin"),
        authorization = %inbound
            .authorization()
            .and_then(|v| v.to_str().ok())
            .map(redact_credential)
            .unwrap_or_else(|| "proxy".to_string()),
        "Proxying request"
    );

    let limit = state.forwarder.config().limits.max_body_size;
    let result = match read_body(body, limit, &parts.headers, &target).await {
        Ok(bytes) => {
            inbound.body = bytes;
            state.forwarder.forward(inbound).await
        }
        Err(e) => Err(e),
    };

    let response = match result {
        Ok(response) => response,
        Err(e) => {
            if e.is_caller_error() {
                tracing::warn!(request_id = %request_id, method = %method, url = %target.url, error = %e, "Rejected request");
            } else {
                tracing::error!(request_id = %request_id, method = %method, url = %target.url, error = %e, "Proxy error");
            }
            metrics::record_error(e.kind());
            e.into_response()
        }
    };

    metrics::record_request(&method, response.status().as_u16(), start_time);
    tracing::debug!(
        request_id = %request_id,
        status = response.status().as_u16(),
        elapsed_ms = start_time.elapsed().as_millis() as u64,
        "Request complete"
    );
    response
}
