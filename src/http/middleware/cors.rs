//! Permissive CORS middleware.
//! Answers preflights and stamps every response with the same headers.

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

pub const ALLOW_ORIGIN: &str = "*";
pub const ALLOW_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
pub const ALLOW_HEADERS: &str =
    "Content-Type, Authorization, Content-Length, X-Requested-With, Accept, Origin";

/// Short-circuit `OPTIONS` with an empty 200; otherwise run the request and
/// overwrite the CORS headers on whatever comes back, errors included.
pub async fn cors_middleware(req: Request<Body>, next: Next) -> Response {
    if req.method() == Method::OPTIONS {
        tracing::debug!(path = %req.uri().path(), "Answering CORS preflight");
        let mut response = StatusCode::OK.into_response();
        apply_cors_headers(response.headers_mut());
        return response;
    }

    let mut response = next.run(req).await;
    apply_cors_headers(response.headers_mut());
    response
}

/// Set the permissive header set, replacing any existing values.
pub fn apply_cors_headers(headers: &mut HeaderMap) {
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static(ALLOW_ORIGIN),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOW_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOW_HEADERS),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{middleware, routing::get, Router};
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new()
            .route(
                "/data",
                get(|| async {
                    (
                        StatusCode::BAD_GATEWAY,
                        [(header::ACCESS_CONTROL_ALLOW_ORIGIN, "https://evil.example")],
                        "boom",
                    )
                }),
            )
            .fallback(|| async { StatusCode::NOT_FOUND })
            .layer(middleware::from_fn(cors_middleware))
    }

    fn assert_cors(headers: &HeaderMap) {
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], ALLOW_METHODS);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], ALLOW_HEADERS);
        assert_eq!(headers.get_all(header::ACCESS_CONTROL_ALLOW_ORIGIN).iter().count(), 1);
    }

    #[tokio::test]
    async fn test_preflight_short_circuits() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/anything/at/all")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_cors(response.headers());
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.is_empty());
    }

    #[tokio::test]
    async fn test_error_responses_get_headers() {
        let response = app()
            .oneshot(Request::builder().uri("/data").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_cors(response.headers());
    }

    #[test]
    fn test_allow_headers_cover_credentials() {
        assert!(ALLOW_HEADERS.contains("Authorization"));
        assert!(ALLOW_HEADERS.contains("Content-Type"));
        for method in ["GET", "POST", "PUT", "DELETE", "OPTIONS"] {
            assert!(ALLOW_METHODS.contains(method));
        }
    }
}
