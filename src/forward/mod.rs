//! Format-preserving request forwarding.
//!
//! # Data Flow
//! ```text
//! InboundRequest
//!     → classify.rs  (content type → ClassifiedBody, or InvalidInboundBody)
//!     → transcode.rs (ClassifiedBody → OutboundRequest: URL, headers, body)
//!     → dispatch.rs  (one upstream call under the route deadline)
//!     → relay.rs     (UpstreamResponse → caller response)
//! ```
//!
//! # Design Decisions
//! - Every inbound request yields one outbound request or is rejected
//!   before dispatch; every dispatch yields one response or one error
//! - No state is shared between requests beyond the immutable config
//!   and the HTTP client pool

pub mod classify;
pub mod dispatch;
pub mod relay;
pub mod transcode;
pub mod types;

use std::sync::Arc;

use axum::response::Response;

use crate::config::ProxyConfig;
use crate::error::{ProxyError, Target};
use crate::routing::{Endpoint, EndpointRules};

pub use dispatch::Dispatcher;
pub use types::{
    ClassifiedBody, FieldMap, FieldValue, FilePart, InboundRequest, MultipartPayload, OutboundBody,
    OutboundRequest, UpstreamResponse,
};

/// Runs the forwarding pipeline for one request at a time.
#[derive(Debug, Clone)]
pub struct Forwarder {
    config: Arc<ProxyConfig>,
    rules: EndpointRules,
    dispatcher: Dispatcher,
}

impl Forwarder {
    pub fn new(config: Arc<ProxyConfig>, dispatcher: Dispatcher) -> Self {
        let rules = EndpointRules::new(
            config.upstream.api_prefix.clone(),
            config.routing.collections.iter().cloned(),
        );
        Self {
            config,
            rules,
            dispatcher,
        }
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// The method and upstream URL an inbound request maps to.
    pub fn target(&self, inbound: &InboundRequest) -> Target {
        let endpoint = self.rules.normalize(&inbound.path);
        self.target_for(inbound, &endpoint)
    }

    fn target_for(&self, inbound: &InboundRequest, endpoint: &Endpoint) -> Target {
        let url = transcode::upstream_url(&self.config.upstream.base_url, &endpoint.path, inbound.query.as_deref());
        Target::new(&inbound.method, url)
    }

    /// Forward one request and produce the caller-facing response.
    pub async fn forward(&self, inbound: InboundRequest) -> Result<Response, ProxyError> {
        let endpoint = self.rules.normalize(&inbound.path);
        let target = self.target_for(&inbound, &endpoint);

        let body = classify::classify(&inbound, &target).await?;
        tracing::debug!(
            method = %target.method,
            url = %target.url,
            body_kind = body.kind(),
            "Classified inbound body"
        );

        let outbound = transcode::transcode(&inbound, body, &endpoint, &self.config);
        let upstream = self.dispatcher.send(outbound).await?;
        relay::relay(upstream, &target, &self.config.relay)
    }
}
