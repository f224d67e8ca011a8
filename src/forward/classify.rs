//! Body classification.
//!
//! # Responsibilities
//! - Decide from the declared content type how a body will be forwarded
//! - Parse JSON, url-encoded and multipart bodies into `ClassifiedBody`
//! - Reject bodies that contradict their content type before any upstream call
//!
//! # Design Decisions
//! - Content type matching is substring-based and case-insensitive,
//!   so `application/json; charset=utf-8` is JSON
//! - Bracketed keys (`texture[0][key]`) are kept as literal text
//! - Unknown content types are never reinterpreted

use axum::body::Bytes;
use axum::http::{header, Method};
use futures_util::stream;

use crate::error::{ProxyError, Target};
use crate::forward::types::{ClassifiedBody, FieldMap, FilePart, InboundRequest};

const JSON: &str = "application/json";
const FORM: &str = "application/x-www-form-urlencoded";
const MULTIPART: &str = "multipart/form-data";
const DEFAULT_FILE_MIME: &str = "application/octet-stream";

/// Classify the body of an inbound request.
///
/// `target` names the call for error reporting.
pub async fn classify(request: &InboundRequest, target: &Target) -> Result<ClassifiedBody, ProxyError> {
    if request.body.is_empty() {
        return Ok(ClassifiedBody::None);
    }
    if matches!(request.method, Method::GET | Method::HEAD | Method::DELETE)
        && request.body.iter().all(u8::is_ascii_whitespace)
    {
        return Ok(ClassifiedBody::None);
    }

    let content_type = match request.content_type() {
        Some(ct) => ct,
        None => return Ok(ClassifiedBody::None),
    };

    if content_type.contains(JSON) {
        let value = serde_json::from_slice(&request.body)
            .map_err(|e| invalid(target, format!("malformed JSON: {}", e)))?;
        Ok(ClassifiedBody::Json(value))
    } else if content_type.contains(FORM) {
        Ok(ClassifiedBody::FormFields(parse_form(&request.body)))
    } else if content_type.contains(MULTIPART) {
        // Boundaries are case-sensitive, so parse the header as sent.
        let raw = request
            .headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        parse_multipart(raw, request.body.clone(), target).await
    } else {
        Ok(ClassifiedBody::None)
    }
}

/// Decode `a=1&b=2&b=3` into fields, keeping every value of a repeated key.
pub fn parse_form(body: &[u8]) -> FieldMap {
    let mut fields = FieldMap::new();
    for (key, value) in url::form_urlencoded::parse(body) {
        fields.insert(key.into_owned(), value.into_owned());
    }
    fields
}

async fn parse_multipart(
    content_type: &str,
    body: Bytes,
    target: &Target,
) -> Result<ClassifiedBody, ProxyError> {
    let boundary = multer::parse_boundary(content_type)
        .map_err(|e| invalid(target, format!("multipart boundary: {}", e)))?;

    let body = stream::iter([Ok::<Bytes, std::io::Error>(body)]);
    let mut multipart = multer::Multipart::new(body, boundary);

    let mut fields = FieldMap::new();
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| invalid(target, format!("multipart: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let mime_type = field.content_type().map(|m| m.to_string());

        let data = field
            .bytes()
            .await
            .map_err(|e| invalid(target, format!("multipart field `{}`: {}", name, e)))?;

        match file_name {
            Some(file_name) => files.push(FilePart {
                field_name: name,
                file_name,
                mime_type: mime_type.unwrap_or_else(|| DEFAULT_FILE_MIME.to_string()),
                bytes: data,
            }),
            None => {
                let text = String::from_utf8(data.to_vec())
                    .map_err(|_| invalid(target, format!("multipart field `{}` is not UTF-8 text", name)))?;
                fields.insert(name, text);
            }
        }
    }

    Ok(ClassifiedBody::Multipart { fields, files })
}

fn invalid(target: &Target, message: String) -> ProxyError {
    ProxyError::InvalidInboundBody {
        message,
        target: target.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forward::types::FieldValue;
    use axum::http::{HeaderMap, HeaderValue};
    use serde_json::json;

    fn request(method: Method, content_type: Option<&str>, body: &'static [u8]) -> InboundRequest {
        let mut headers = HeaderMap::new();
        if let Some(ct) = content_type {
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_str(ct).unwrap());
        }
        InboundRequest {
            method,
            path: "/api/product".into(),
            query: None,
            headers,
            body: Bytes::from_static(body),
        }
    }

    fn target() -> Target {
        Target::new("POST", "https://app.veez.ai/api/product/")
    }

    #[tokio::test]
    async fn test_json_body() {
        let req = request(Method::POST, Some("application/json; charset=utf-8"), br#"{"name":"chair","n":[1,2]}"#);
        let body = classify(&req, &target()).await.unwrap();
        assert_eq!(body, ClassifiedBody::Json(json!({"name": "chair", "n": [1, 2]})));
    }

    #[tokio::test]
    async fn test_malformed_json_is_rejected() {
        let req = request(Method::POST, Some("application/json"), b"{\"name\":");
        let err = classify(&req, &target()).await.unwrap_err();
        assert!(matches!(err, ProxyError::InvalidInboundBody { .. }));
    }

    #[tokio::test]
    async fn test_content_type_is_case_insensitive() {
        let req = request(Method::POST, Some("Application/JSON"), b"[1]");
        let body = classify(&req, &target()).await.unwrap();
        assert_eq!(body.kind(), "json");
    }

    #[tokio::test]
    async fn test_form_body_keeps_lists_and_literal_keys() {
        let req = request(
            Method::POST,
            Some("application/x-www-form-urlencoded"),
            b"name=my+chair&tag=a&tag=b&texture%5B0%5D%5Bkey%5D=wood",
        );
        let body = classify(&req, &target()).await.unwrap();
        let ClassifiedBody::FormFields(fields) = body else {
            panic!("expected form fields");
        };
        assert_eq!(fields.get("name"), Some(&FieldValue::Text("my chair".into())));
        assert_eq!(fields.get("tag"), Some(&FieldValue::List(vec!["a".into(), "b".into()])));
        assert_eq!(fields.get("texture[0][key]"), Some(&FieldValue::Text("wood".into())));
    }

    #[tokio::test]
    async fn test_multipart_body() {
        let body: &'static [u8] = b"--XyZ\r\n\
Content-Disposition: form-data; name=\"name\"\r\n\r\n\
chair\r\n\
--XyZ\r\n\
Content-Disposition: form-data; name=\"texture[0][key]\"\r\n\r\n\
wood\r\n\
--XyZ\r\n\
Content-Disposition: form-data; name=\"image\"; filename=\"chair.png\"\r\n\
Content-Type: image/png\r\n\r\n\
\x89PNG\x00\x01\r\n\
--XyZ--\r\n";
        let req = request(Method::POST, Some("multipart/form-data; boundary=XyZ"), body);

        let ClassifiedBody::Multipart { fields, files } = classify(&req, &target()).await.unwrap() else {
            panic!("expected multipart");
        };
        assert_eq!(fields.get("name"), Some(&FieldValue::Text("chair".into())));
        assert_eq!(fields.get("texture[0][key]"), Some(&FieldValue::Text("wood".into())));
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].field_name, "image");
        assert_eq!(files[0].file_name, "chair.png");
        assert_eq!(files[0].mime_type, "image/png");
        assert_eq!(&files[0].bytes[..], b"\x89PNG\x00\x01");
    }

    #[tokio::test]
    async fn test_multipart_without_boundary_is_rejected() {
        let req = request(Method::POST, Some("multipart/form-data"), b"--x--");
        let err = classify(&req, &target()).await.unwrap_err();
        assert!(matches!(err, ProxyError::InvalidInboundBody { .. }));
    }

    #[tokio::test]
    async fn test_unknown_content_type_is_passthrough() {
        let req = request(Method::PUT, Some("image/png"), b"\x89PNG");
        assert_eq!(classify(&req, &target()).await.unwrap(), ClassifiedBody::None);

        let req = request(Method::POST, None, b"raw bytes");
        assert_eq!(classify(&req, &target()).await.unwrap(), ClassifiedBody::None);
    }

    #[tokio::test]
    async fn test_empty_bodies() {
        let req = request(Method::GET, Some("application/json"), b"");
        assert_eq!(classify(&req, &target()).await.unwrap(), ClassifiedBody::None);

        let req = request(Method::DELETE, Some("application/json"), b"  \n");
        assert_eq!(classify(&req, &target()).await.unwrap(), ClassifiedBody::None);
    }
}
