//! Upstream dispatch.
//!
//! # Responsibilities
//! - Send exactly one outbound call per inbound request
//! - Enforce the route's deadline over send + full body read
//! - Map transport failures to `UpstreamUnreachable` / `UpstreamTimeout`
//!
//! # Design Decisions
//! - Never retried: creation endpoints are not idempotent
//! - Uses Tokio's timeout; on expiry the in-flight call is dropped, which
//!   releases its connection, and nothing is sent to cancel upstream work
//! - Connection reuse is whatever `reqwest` pools by default

use std::time::{Duration, Instant};

use reqwest::multipart::{Form, Part};

use crate::error::{ProxyError, Target};
use crate::forward::types::{FilePart, MultipartPayload, OutboundBody, OutboundRequest, UpstreamResponse};

/// Client for the upstream API. Cheap to clone; clones share a pool.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    client: reqwest::Client,
}

impl Dispatcher {
    /// Build a dispatcher with the given connect timeout.
    pub fn new(connect_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self { client })
    }

    /// Send the request and read the whole response.
    pub async fn send(&self, request: OutboundRequest) -> Result<UpstreamResponse, ProxyError> {
        let target = Target::new(&request.method, request.url.clone());
        let deadline = request.timeout;
        let start = Instant::now();

        tracing::debug!(
            method = %target.method,
            url = %target.url,
            timeout_secs = deadline.as_secs(),
            "Dispatching upstream request"
        );

        let mut builder = self
            .client
            .request(request.method, &request.url)
            .headers(request.headers);

        builder = match request.body {
            OutboundBody::Empty => builder,
            OutboundBody::Bytes { bytes, .. } => builder.body(bytes),
            OutboundBody::Multipart(payload) => builder.multipart(multipart_form(payload)),
        };

        let call = async {
            let response = builder.send().await?;
            let status = response.status();
            let headers = response.headers().clone();
            let body = response.bytes().await?;
            Ok::<_, reqwest::Error>(UpstreamResponse { status, headers, body })
        };

        match tokio::time::timeout(deadline, call).await {
            Ok(Ok(response)) => {
                tracing::info!(
                    method = %target.method,
                    url = %target.url,
                    status = response.status.as_u16(),
                    bytes = response.body.len(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Upstream responded"
                );
                Ok(response)
            }
            Ok(Err(e)) if e.is_timeout() => Err(ProxyError::UpstreamTimeout {
                message: e.to_string(),
                target,
            }),
            Ok(Err(e)) => Err(ProxyError::UpstreamUnreachable {
                message: e.to_string(),
                target,
            }),
            Err(_) => Err(ProxyError::UpstreamTimeout {
                message: format!("no response within {}s", deadline.as_secs()),
                target,
            }),
        }
    }
}

/// Rebuild a multipart form; `reqwest` generates the boundary.
pub fn multipart_form(payload: MultipartPayload) -> Form {
    let mut form = Form::new();
    for (name, value) in payload.fields {
        form = form.text(name, value);
    }
    for file in payload.files {
        let name = file.field_name.clone();
        form = form.part(name, file_part(file));
    }
    form
}

fn file_part(file: FilePart) -> Part {
    let FilePart {
        file_name,
        mime_type,
        bytes,
        ..
    } = file;
    let part = || Part::bytes(bytes.to_vec()).file_name(file_name.clone());
    // An unparsable MIME type falls back to reqwest's octet-stream default.
    part().mime_str(&mime_type).unwrap_or_else(|_| part())
}
