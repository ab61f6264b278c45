use axum::{extract::State, routing::get, Json, Router};
use tracing::warn;

use crate::db::{self, DatabaseOperations};
use crate::models::{AppState, HealthResponse};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let (status, database) = match db::health_check(&state.pool).await {
        Ok(_) => ("ok", "connected"),
        Err(e) => {
            warn!(error = %e, "Database health check failed");
            ("degraded", "unavailable")
        }
    };
    let profiles = DatabaseOperations::count_profiles(&state.pool).await.ok();

    Json(HealthResponse {
        status: status.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        database: database.to_string(),
        profiles,
    })
}
