use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use base64::Engine as _;

use crate::agents::DataSnapshot;
use crate::models::{AppState, ImageResponse};
use crate::types::{AppError, AppResult};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/data", get(latest_data).post(latest_data))
        .route("/plot", get(latest_plot))
        .route("/plot/{id}", get(plot_by_id))
        .route("/img", get(latest_image).post(latest_image))
        .with_state(state)
}

/// Rows and column names of the latest analysis query.
async fn latest_data(State(state): State<AppState>) -> Json<DataSnapshot> {
    Json(state.snapshot.read().await.clone())
}

fn png(bytes: Vec<u8>) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "image/png"), (header::CACHE_CONTROL, "no-store")], bytes)
}

async fn latest_plot(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    Ok(png(state.plots.latest().await?))
}

async fn plot_by_id(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<impl IntoResponse> {
    Ok(png(state.plots.get(&id).await?))
}

/// Latest plot as base64, `null` before the first chart.
async fn latest_image(State(state): State<AppState>) -> AppResult<Json<ImageResponse>> {
    let image = match state.plots.latest().await {
        Ok(bytes) => Some(base64::engine::general_purpose::STANDARD.encode(bytes)),
        Err(AppError::NotFound(_)) => None,
        Err(e) => return Err(e),
    };
    Ok(Json(ImageResponse { image }))
}
