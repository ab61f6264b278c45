use axum::{extract::State, routing::post, Json, Router};
use tracing::{info, warn};

use crate::agents::analysis::{NamedLog, PlotSource};
use crate::agents::study::{clean_reply, wants_chart};
use crate::models::{AppState, StudyLog, StudyRequest, StudyResponse};
use crate::types::{AppError, AppResult};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/study", post(study))
        .with_state(state)
}

async fn chart_answer(state: &AppState, message: &str) -> StudyResponse {
    let outcome = match state.agents.analysis.analyse(message).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(error = %e, "Chart request failed");
            return StudyResponse {
                response: format!("Failed to generate chart: {}", e),
                sandbox: false,
                sandbox_code: None,
                plot_url: None,
                tool_logs: vec![StudyLog::Step(NamedLog {
                    name: "error".to_string(),
                    output: format!("Analysis failed: {}", e),
                })],
            };
        }
    };

    if !outcome.chart_requested {
        return StudyResponse {
            response: "I cannot create a visualization for this request.".to_string(),
            sandbox: false,
            sandbox_code: None,
            plot_url: None,
            tool_logs: Vec::new(),
        };
    }

    let response = match &outcome.plot {
        Some(_) => format!(
            "Here's your {}. The chart has been generated successfully!",
            message.to_lowercase()
        ),
        None => format!(
            "I ran the query ({} rows) but could not draw a chart for it.",
            outcome.row_count
        ),
    };

    StudyResponse {
        response,
        sandbox: outcome.plot_source == Some(PlotSource::Sandbox),
        sandbox_code: None,
        plot_url: outcome.plot.map(|plot| plot.url),
        tool_logs: outcome.logs.into_iter().map(StudyLog::Step).collect(),
    }
}

/// Chart requests go straight to the analysis agent; everything else runs
/// through the routing graph.
async fn study(State(state): State<AppState>, Json(request): Json<StudyRequest>) -> AppResult<Json<StudyResponse>> {
    let message = request.message.trim();
    if message.is_empty() {
        return Err(AppError::InvalidRequest("message is required".to_string()));
    }

    if wants_chart(message) {
        info!(message = %message, "Study chart request");
        return Ok(Json(chart_answer(&state, message).await));
    }

    let run = state.agents.graph.invoke(vec![message.to_string()]).await?;
    info!(steps = run.steps, tools = run.tool_logs.len(), "Study answer ready");

    Ok(Json(StudyResponse {
        response: clean_reply(&run.response),
        sandbox: false,
        sandbox_code: None,
        plot_url: None,
        tool_logs: run.tool_logs.into_iter().map(StudyLog::Tool).collect(),
    }))
}
