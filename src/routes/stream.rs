//! Server-sent event endpoints. Every stream ends with a `[END]` event;
//! failures are reported in-band as a single `ERROR: ...` event.

use std::convert::Infallible;
use std::pin::Pin;

use async_stream::stream;
use axum::{
    extract::State,
    response::sse::{Event, Sse},
    routing::post,
    Json, Router,
};
use futures::{Stream, StreamExt};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::agents::study::{clean_reply, format_for_stream};
use crate::models::{AppState, ChatHistory, StudyRequest};
use crate::types::LLMMessage;

pub const END_EVENT: &str = "[END]";

type EventStream = Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/stream", post(store_history).get(chat_stream))
        .route("/api/study-stream", post(study_stream))
        .with_state(state)
}

/// SSE data may not contain carriage returns.
fn event(text: impl Into<String>) -> Event {
    Event::default().data(text.into().replace('\r', " "))
}

fn single(message: impl Into<String>) -> Sse<EventStream> {
    let events: EventStream = Box::pin(futures::stream::iter([Ok::<_, Infallible>(event(message))]));
    Sse::new(events)
}

fn lines_then_end(lines: Vec<String>) -> Sse<EventStream> {
    let events = lines
        .into_iter()
        .chain(std::iter::once(END_EVENT.to_string()))
        .map(|line| Ok::<_, Infallible>(event(line)));
    let events: EventStream = Box::pin(futures::stream::iter(events));
    Sse::new(events)
}

/// Accumulates streamed text and hands back complete, non-blank lines.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: String,
}

impl LineBuffer {
    pub fn push(&mut self, chunk: &str) -> Vec<String> {
        self.pending.push_str(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.find('\n') {
            let line: String = self.pending.drain(..=pos).collect();
            let line = line.trim();
            if !line.is_empty() {
                lines.push(line.to_string());
            }
        }
        lines
    }

    pub fn finish(self) -> Option<String> {
        let rest = self.pending.trim();
        (!rest.is_empty()).then(|| rest.to_string())
    }
}

async fn store_history(State(state): State<AppState>, Json(history): Json<ChatHistory>) -> Json<Value> {
    info!(turns = history.messages.len(), "Chat history stored");
    *state.history.write().await = Some(history);
    Json(json!({ "status": "ok" }))
}

async fn chat_stream(State(state): State<AppState>) -> Sse<EventStream> {
    let Some(history) = state.history.read().await.clone() else {
        return single("ERROR: No history received");
    };
    if history.messages.is_empty() {
        return single("ERROR: Empty messages");
    }

    let messages: Vec<LLMMessage> = history
        .messages
        .into_iter()
        .map(|turn| LLMMessage::new(turn.role, turn.content))
        .collect();

    let mut chunks = match state.agents.chat.chat_stream(messages).await {
        Ok(chunks) => chunks,
        Err(e) => {
            warn!(error = %e, "Chat stream failed to start");
            return single(format!("ERROR: {}", e));
        }
    };

    let events = stream! {
        let mut buffer = LineBuffer::default();
        let mut failed = false;
        while let Some(chunk) = chunks.next().await {
            match chunk {
                Ok(text) => {
                    for line in buffer.push(&text) {
                        yield Ok::<_, Infallible>(event(line));
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Chat stream interrupted");
                    yield Ok::<_, Infallible>(event(format!("ERROR: {}", e)));
                    failed = true;
                    break;
                }
            }
        }
        if !failed {
            if let Some(rest) = buffer.finish() {
                yield Ok::<_, Infallible>(event(rest));
            }
            yield Ok::<_, Infallible>(event(END_EVENT));
        }
    };
    let events: EventStream = Box::pin(events);
    Sse::new(events)
}

async fn study_stream(State(state): State<AppState>, Json(request): Json<StudyRequest>) -> Sse<EventStream> {
    let message = request.message.trim();
    if message.is_empty() {
        return single("ERROR: No message provided");
    }

    let raw = match state.agents.router.gen(message).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!(error = %e, "Study stream generation failed");
            return single(format!("ERROR: {}", e));
        }
    };

    let output = clean_reply(raw.trim());
    if output.trim().is_empty() {
        return single("ERROR: Empty output");
    }
    lines_then_end(format_for_stream(&output))
}
