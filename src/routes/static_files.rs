//! Serves the built chat frontend. Unknown paths fall back to `index.html`
//! so client-side routes resolve.

use std::path::Path;

use axum::Router;
use tower_http::services::{ServeDir, ServeFile};
use tracing::{info, warn};

pub fn router(static_dir: &str) -> Router {
    let dir = Path::new(static_dir);
    if dir.is_dir() {
        info!(path = %dir.display(), "Serving frontend");
    } else {
        warn!(path = %dir.display(), "Static files directory not found, frontend may not be built");
    }

    let serve_dir = ServeDir::new(dir)
        .append_index_html_on_directories(true)
        .fallback(ServeFile::new(dir.join("index.html")));

    Router::new().fallback_service(serve_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::testing::body_text;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_spa_fallback() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<html>argo chat</html>").unwrap();
        std::fs::write(dir.path().join("app.js"), "console.log(1)").unwrap();
        let app = router(dir.path().to_str().unwrap());

        let asset = app
            .clone()
            .oneshot(Request::get("/app.js").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_text(asset).await, "console.log(1)");

        let deep_link = app
            .oneshot(Request::get("/chats/42").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(deep_link.status(), StatusCode::OK);
        assert_eq!(body_text(deep_link).await, "<html>argo chat</html>");
    }
}
