use axum::http::HeaderValue;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

/// CORS for the configured origins; `*` (or nothing) allows any origin.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(allowed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request};
    use axum::{routing::get, Router};
    use tower::ServiceExt;

    async fn allow_origin_for(origins: &[&str], origin: &str) -> Option<String> {
        let origins: Vec<String> = origins.iter().map(|s| s.to_string()).collect();
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(cors_layer(&origins));
        let response = app
            .oneshot(Request::get("/").header(header::ORIGIN, origin).body(Body::empty()).unwrap())
            .await
            .unwrap();
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .map(|v| v.to_str().unwrap().to_string())
    }

    #[tokio::test]
    async fn test_wildcard_and_list() {
        assert_eq!(allow_origin_for(&["*"], "http://a.test").await.as_deref(), Some("*"));
        assert_eq!(
            allow_origin_for(&["http://a.test", "http://b.test"], "http://b.test").await.as_deref(),
            Some("http://b.test")
        );
        assert_eq!(allow_origin_for(&["http://a.test"], "http://evil.test").await, None);
    }
}
