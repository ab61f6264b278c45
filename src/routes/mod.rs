//! API Routes
//!
//! - `/api/stream` - store chat history (POST) and stream the reply (GET, SSE)
//! - `/api/study-stream` - router answer streamed line by line (SSE)
//! - `/api/study` - study mode through the agent graph or the analysis agent
//! - `/api/rename` - chat titles
//! - `/api/health` - health check
//! - `/data`, `/plot`, `/plot/{id}` - latest analysis rows and charts
//! - `/` - static frontend with SPA fallback

pub mod data;
pub mod health;
pub mod rename;
pub mod static_files;
pub mod stream;
pub mod study;

use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::middleware::cors_layer;
use crate::models::AppState;

/// API routes take precedence over static files.
pub fn create_router(state: AppState) -> Router {
    info!("Creating application router");

    let cors = cors_layer(&state.config.server.cors_allowed_origins);
    let static_dir = state.config.server.static_dir.clone();

    let api_router = Router::new()
        .merge(stream::router(state.clone()))
        .merge(study::router(state.clone()))
        .merge(rename::router(state.clone()))
        .merge(data::router(state.clone()))
        .merge(health::router(state));

    Router::new()
        .merge(api_router)
        .merge(static_files::router(&static_dir))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}


#[cfg(test)]
mod tests {
    use super::testing::{body_json, test_state};
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_api_routes_take_precedence() {
        let (state, _adapter, dir) = test_state(Vec::<String>::new()).await;
        std::fs::create_dir_all(dir.path().join("dist")).unwrap();
        std::fs::write(dir.path().join("dist").join("index.html"), "<html></html>").unwrap();

        let app = create_router(state);
        let health = app
            .clone()
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_json(health).await["status"], "ok");

        let page = app
            .oneshot(Request::get("/somewhere").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(page.status(), StatusCode::OK);
    }
}
