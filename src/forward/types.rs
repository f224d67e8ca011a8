//! Data carried through one forwarded request.
//!
//! Each value is owned by the handling request and dropped once the
//! response has been sent. Nothing here is shared between requests.

use std::time::Duration;

use axum::body::Bytes;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use serde_json::Value;

/// A request as received from the caller, fully buffered.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    /// Path as received, e.g. `/api/product`.
    pub path: String,
    /// Raw query string without the leading `?`.
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl InboundRequest {
    /// Declared content type, lowercased.
    pub fn content_type(&self) -> Option<String> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_ascii_lowercase)
    }

    /// Caller-supplied Authorization header, if any.
    pub fn authorization(&self) -> Option<&HeaderValue> {
        self.headers.get(header::AUTHORIZATION)
    }

    /// Path plus query, as it appears on the wire.
    pub fn path_and_query(&self) -> String {
        match &self.query {
            Some(q) => format!("{}?{}", self.path, q),
            None => self.path.clone(),
        }
    }
}

/// A form field value: one string, or every value of a repeated key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    pub fn values(&self) -> Vec<&str> {
        match self {
            FieldValue::Text(v) => vec![v.as_str()],
            FieldValue::List(vs) => vs.iter().map(String::as_str).collect(),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Text(v) => Value::String(v.clone()),
            FieldValue::List(vs) => Value::Array(vs.iter().cloned().map(Value::String).collect()),
        }
    }
}

/// Form fields in arrival order.
///
/// Keys are opaque text: `texture[0][key]` is a key, not a nested path.
/// Inserting an existing key turns its value into a list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMap {
    entries: Vec<(String, FieldValue)>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some((_, existing)) => match existing {
                FieldValue::Text(first) => {
                    *existing = FieldValue::List(vec![std::mem::take(first), value]);
                }
                FieldValue::List(values) => values.push(value),
            },
            None => self.entries.push((name, FieldValue::Text(value))),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.entries.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// JSON object with strings for single values and arrays for lists.
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.entries
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

/// A file attachment from a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub field_name: String,
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Bytes,
}

/// The inbound body after classification. Exactly one variant per request.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassifiedBody {
    /// No body, or an opaque payload forwarded byte-for-byte.
    None,
    Json(Value),
    FormFields(FieldMap),
    Multipart { fields: FieldMap, files: Vec<FilePart> },
}

impl ClassifiedBody {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ClassifiedBody::None => "none",
            ClassifiedBody::Json(_) => "json",
            ClassifiedBody::FormFields(_) => "form",
            ClassifiedBody::Multipart { .. } => "multipart",
        }
    }
}

/// Multipart payload rebuilt for the upstream; the boundary is generated
/// when the body is encoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartPayload {
    pub fields: Vec<(String, String)>,
    pub files: Vec<FilePart>,
}

/// Outbound body.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundBody {
    Empty,
    Bytes {
        content_type: Option<HeaderValue>,
        bytes: Bytes,
    },
    Multipart(MultipartPayload),
}

/// The call the dispatcher makes for one inbound request.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: OutboundBody,
    pub timeout: Duration,
}

/// What the upstream answered, fully read.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl UpstreamResponse {
    /// Declared content type, lowercased.
    pub fn content_type(&self) -> Option<String> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_ascii_lowercase)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_map_collects_repeated_keys() {
        let mut fields = FieldMap::new();
        fields.insert("name", "chair");
        fields.insert("tag", "a");
        fields.insert("tag", "b");
        fields.insert("tag", "c");

        assert_eq!(fields.len(), 2);
        assert_eq!(fields.get("name"), Some(&FieldValue::Text("chair".into())));
        assert_eq!(
            fields.get("tag"),
            Some(&FieldValue::List(vec!["a".into(), "b".into(), "c".into()]))
        );
        assert_eq!(fields.to_json(), json!({"name": "chair", "tag": ["a", "b", "c"]}));
    }

    #[test]
    fn test_field_map_keeps_bracket_keys_literal() {
        let mut fields = FieldMap::new();
        fields.insert("texture[0][key]", "wood");
        assert_eq!(fields.to_json(), json!({"texture[0][key]": "wood"}));
    }

    #[test]
    fn test_path_and_query() {
        let req = InboundRequest {
            method: Method::GET,
            path: "/api/product/".into(),
            query: Some("page=2".into()),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        };
        assert_eq!(req.path_and_query(), "/api/product/?page=2");
    }
}
