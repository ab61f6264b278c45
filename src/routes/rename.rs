use axum::{extract::State, routing::post, Json, Router};

use crate::agents::title::suggest_title;
use crate::models::{AppState, RenameRequest, RenameResponse};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/rename", post(rename_chat))
        .with_state(state)
}

async fn rename_chat(State(state): State<AppState>, Json(request): Json<RenameRequest>) -> Json<RenameResponse> {
    let title = suggest_title(&state.agents.titler, &request.user, &request.bot, &request.mode).await;
    Json(RenameResponse { title })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::title::TITLE_MAX_TOKENS;
    use crate::routes::testing::{body_json, post_json, test_state};
    use serde_json::json;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_rename() {
        let (state, adapter, _dir) = test_state([r#"{"type":"reply","output":"Atlantic Float Temperature Trends"}"#]).await;
        let app = router(state);

        let body = body_json(
            app.clone()
                .oneshot(post_json("/api/rename", json!({"user": "temps?", "bot": "Warming.", "mode": "study"})))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(body, json!({"title": "Atlantic Float Temperature Trends"}));
        assert_eq!(adapter.requests.lock().unwrap()[0].max_tokens, Some(TITLE_MAX_TOKENS));

        let body = body_json(app.oneshot(post_json("/api/rename", json!({"user": "hi"}))).await.unwrap()).await;
        assert_eq!(body["title"], "New Chat");
    }
}
