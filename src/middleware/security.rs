// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Response headers for the read-only JSON API.

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};

/// Add security and caching headers to all responses.
pub async fn add_api_headers(req: Request, next: Next) -> Response {
    let is_api = req.uri().path().starts_with("/api/");
    let mut response = next.run(req).await;
    let cacheable = is_api && response.status().is_success();
    let headers = response.headers_mut();

    headers.insert(
        "X-Content-Type-Options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    headers.insert(
        "Content-Security-Policy",
        HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
    );
    headers.insert("Referrer-Policy", HeaderValue::from_static("no-referrer"));

    // Leaderboards change slowly; let clients reuse them briefly
    if cacheable {
        headers.insert(
            "Cache-Control",
            HeaderValue::from_static("public, max-age=60"),
        );
    } else {
        headers.insert("Cache-Control", HeaderValue::from_static("no-store"));
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::{routing::get, Router};
    use tower::ServiceExt; // for oneshot

    fn app() -> Router {
        Router::new()
            .route("/api/ok", get(|| async { "ok" }))
            .route("/api/fail", get(|| async { StatusCode::BAD_GATEWAY }))
            .route("/health", get(|| async { "ok" }))
            .layer(axum::middleware::from_fn(add_api_headers))
    }

    async fn get_headers(uri: &str) -> axum::http::HeaderMap {
        app()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
            .headers()
            .clone()
    }

    #[tokio::test]
    async fn test_security_headers() {
        let headers = get_headers("/api/ok").await;

        assert_eq!(headers.get("X-Content-Type-Options").unwrap(), "nosniff");
        assert_eq!(headers.get("X-Frame-Options").unwrap(), "DENY");
        assert_eq!(
            headers.get("Content-Security-Policy").unwrap(),
            "default-src 'none'; frame-ancestors 'none'"
        );
        assert_eq!(headers.get("Referrer-Policy").unwrap(), "no-referrer");
    }

    #[tokio::test]
    async fn test_cache_control() {
        assert_eq!(
            get_headers("/api/ok").await.get("Cache-Control").unwrap(),
            "public, max-age=60"
        );
        assert_eq!(
            get_headers("/api/fail").await.get("Cache-Control").unwrap(),
            "no-store"
        );
        assert_eq!(
            get_headers("/health").await.get("Cache-Control").unwrap(),
            "no-store"
        );
    }
}
