//! Request transcoding.
//!
//! # Responsibilities
//! - Turn a `ClassifiedBody` into the wire body the upstream accepts
//! - Build the outbound header set (credential, User-Agent, request ID)
//! - Compute the upstream URL and the route's deadline
//!
//! # Design Decisions
//! - JSON and url-encoded submissions are sent as JSON by default; the
//!   upstream mishandles url-encoded nested/array keys
//! - Lists of sub-records in multipart fields are flattened to
//!   `<field>[<index>][<subkey>]`, the only shape the upstream understands
//! - Passthrough bodies keep their bytes and content type untouched
//! - A caller-supplied Authorization header wins over the proxy token

use axum::body::Bytes;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;

use crate::config::{ProxyConfig, UpstreamEncoding};
use crate::forward::types::{
    ClassifiedBody, FieldMap, FieldValue, InboundRequest, MultipartPayload, OutboundBody,
    OutboundRequest,
};
use crate::routing::Endpoint;

/// Header used to correlate proxy and upstream logs.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

const DEFAULT_ACCEPT: &str = "application/json, */*";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Build the single outbound request for an inbound one.
pub fn transcode(
    inbound: &InboundRequest,
    body: ClassifiedBody,
    endpoint: &Endpoint,
    config: &ProxyConfig,
) -> OutboundRequest {
    let url = upstream_url(&config.upstream.base_url, &endpoint.path, inbound.query.as_deref());
    let mut headers = outbound_headers(inbound, config);

    let body = encode_body(body, inbound, config.upstream.encoding);
    if let OutboundBody::Bytes { content_type, bytes } = &body {
        if let Some(ct) = content_type {
            headers.insert(header::CONTENT_TYPE, ct.clone());
        }
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(bytes.len()));
    }

    OutboundRequest {
        method: inbound.method.clone(),
        url,
        headers,
        body,
        timeout: config.timeouts.for_collection(endpoint.collection.as_deref()),
    }
}

/// Join the upstream base URL, a normalized path and the original query.
pub fn upstream_url(base_url: &str, path: &str, query: Option<&str>) -> String {
    let mut url = format!("{}{}", base_url.trim_end_matches('/'), path);
    if let Some(query) = query.filter(|q| !q.is_empty()) {
        url.push('?');
        url.push_str(query);
    }
    url
}

/// Outbound headers, excluding body framing.
///
/// Only the credential, Accept and request ID travel from the caller; hop-by-hop
/// and host headers never do.
pub fn outbound_headers(inbound: &InboundRequest, config: &ProxyConfig) -> HeaderMap {
    let mut headers = HeaderMap::new();

    match inbound.authorization() {
        Some(auth) => {
            headers.insert(header::AUTHORIZATION, auth.clone());
        }
        None if config.upstream.has_token() => {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", config.upstream.token.trim())) {
                headers.insert(header::AUTHORIZATION, value);
            }
        }
        None => {}
    }

    if let Ok(ua) = HeaderValue::from_str(&config.upstream.user_agent) {
        headers.insert(header::USER_AGENT, ua);
    }

    let accept = inbound
        .headers
        .get(header::ACCEPT)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_ACCEPT));
    headers.insert(header::ACCEPT, accept);

    if let Some(id) = inbound.headers.get(&X_REQUEST_ID) {
        headers.insert(X_REQUEST_ID, id.clone());
    }

    headers
}

/// Encode a classified body for the upstream.
pub fn encode_body(body: ClassifiedBody, inbound: &InboundRequest, encoding: UpstreamEncoding) -> OutboundBody {
    match body {
        ClassifiedBody::None if inbound.body.is_empty() => OutboundBody::Empty,
        ClassifiedBody::None => OutboundBody::Bytes {
            content_type: inbound.headers.get(header::CONTENT_TYPE).cloned(),
            bytes: inbound.body.clone(),
        },
        ClassifiedBody::Json(value) => match (encoding, &value) {
            (UpstreamEncoding::Form, Value::Object(map)) => {
                let mut pairs = Vec::new();
                for (key, value) in map {
                    flatten_value(key.clone(), value, &mut pairs);
                }
                form_body(&pairs)
            }
            _ => json_body(&value),
        },
        ClassifiedBody::FormFields(fields) => match encoding {
            UpstreamEncoding::Json => json_body(&fields.to_json()),
            UpstreamEncoding::Form => form_body(&field_pairs(&fields)),
        },
        ClassifiedBody::Multipart { fields, files } => {
            let mut expanded = Vec::new();
            for (name, value) in fields.iter() {
                expanded.extend(expand_field(name, value));
            }
            OutboundBody::Multipart(MultipartPayload {
                fields: expanded,
                files,
            })
        }
    }
}

fn json_body(value: &Value) -> OutboundBody {
    // Serializing a `Value` cannot fail: every key is already a string.
    let bytes = serde_json::to_vec(value).unwrap_or_default();
    OutboundBody::Bytes {
        content_type: Some(HeaderValue::from_static("application/json")),
        bytes: Bytes::from(bytes),
    }
}

fn form_body(pairs: &[(String, String)]) -> OutboundBody {
    let encoded = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish();
    OutboundBody::Bytes {
        content_type: Some(HeaderValue::from_static(FORM_CONTENT_TYPE)),
        bytes: Bytes::from(encoded),
    }
}

fn field_pairs(fields: &FieldMap) -> Vec<(String, String)> {
    fields
        .iter()
        .flat_map(|(name, value)| {
            value
                .values()
                .into_iter()
                .map(move |v| (name.to_string(), v.to_string()))
        })
        .collect()
}

/// Expand one multipart text field into the flat fields sent upstream.
///
/// A value holding a JSON array of objects, e.g. texture descriptors
/// `[{"key":"label","value":"a.png"}]` under `texture`, becomes
/// `texture[0][key]=label` and `texture[0][value]=a.png`. Repeated fields
/// are re-emitted once per value; their sub-records share one index
/// sequence. Everything else passes as-is.
pub fn expand_field(name: &str, value: &FieldValue) -> Vec<(String, String)> {
    let base = name.strip_suffix("[]").unwrap_or(name);
    let mut out = Vec::new();
    let mut index = 0;
    for text in value.values() {
        match sub_records(text) {
            Some(records) => {
                for record in &records {
                    flatten_value(format!("{}[{}]", base, index), record, &mut out);
                    index += 1;
                }
            }
            None => out.push((name.to_string(), text.to_string())),
        }
    }
    out
}

/// A non-empty JSON array whose every element is an object.
fn sub_records(text: &str) -> Option<Vec<Value>> {
    if !text.trim_start().starts_with('[') {
        return None;
    }
    match serde_json::from_str::<Value>(text).ok()? {
        Value::Array(items) if !items.is_empty() && items.iter().all(Value::is_object) => Some(items),
        _ => None,
    }
}

/// Flatten a JSON value into bracket-keyed pairs under `prefix`.
fn flatten_value(prefix: String, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (key, v) in map {
                flatten_value(format!("{}[{}]", prefix, key), v, out);
            }
        }
        Value::Array(items) => {
            for (index, v) in items.iter().enumerate() {
                flatten_value(format!("{}[{}]", prefix, index), v, out);
            }
        }
        Value::String(s) => out.push((prefix, s.clone())),
        Value::Null => out.push((prefix, String::new())),
        other => out.push((prefix, other.to_string())),
    }
}
