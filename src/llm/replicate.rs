// Replicate predictions adapter.
// Language models on Replicate take a `prompt` + `system_prompt` input and return
// their output as an array of text fragments that concatenate to the completion.
// API Reference: https://replicate.com/docs/reference/http

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::llm::provider::LLMAdapter;
use crate::types::{AppError, AppResult, LLMRequest, LLMResponse, TokenUsage};

const REPLICATE_API_BASE: &str = "https://api.replicate.com/v1";
const MAX_POLLS: u32 = 300;

pub struct ReplicateAdapter {
    client: Client,
    api_token: String,
    api_base: String,
    poll_interval: Duration,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    id: String,
    status: String,
    #[serde(default)]
    output: Value,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    urls: Option<PredictionUrls>,
    #[serde(default)]
    metrics: Option<PredictionMetrics>,
}

#[derive(Debug, Deserialize)]
struct PredictionUrls {
    get: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PredictionMetrics {
    #[serde(default)]
    input_token_count: Option<u32>,
    #[serde(default)]
    output_token_count: Option<u32>,
}

impl ReplicateAdapter {
    pub fn new(api_token: &str) -> Self {
        Self::new_with_api_base(api_token, REPLICATE_API_BASE)
    }

    pub fn new_with_api_base(api_token: &str, api_base: &str) -> Self {
        Self {
            client: Client::new(),
            api_token: api_token.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
            poll_interval: Duration::from_secs(1),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Build the model input. A single user turn becomes `prompt`; a longer
    /// conversation is passed as `messages` with the last user turn as `prompt`.
    fn build_input(request: &LLMRequest) -> Value {
        let mut input = serde_json::Map::new();

        let prompt = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.clone())
            .unwrap_or_default();
        input.insert("prompt".to_string(), Value::String(prompt));

        if request.messages.len() > 1 {
            let messages: Vec<Value> = request
                .messages
                .iter()
                .map(|m| json!({ "role": m.role, "content": m.content }))
                .collect();
            input.insert("messages".to_string(), Value::Array(messages));
        }
        if let Some(system) = &request.system_instruction {
            input.insert("system_prompt".to_string(), Value::String(system.clone()));
        }
        if let Some(max_tokens) = request.max_tokens {
            input.insert("max_completion_tokens".to_string(), json!(max_tokens));
        }
        if let Some(temperature) = request.temperature {
            input.insert("temperature".to_string(), json!(temperature));
        }

        json!({ "input": input })
    }

    /// Concatenate prediction output fragments.
    fn output_text(output: &Value) -> String {
        match output {
            Value::String(s) => s.clone(),
            Value::Array(parts) => parts
                .iter()
                .map(|p| match p {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }

    async fn fetch(&self, url: &str) -> AppResult<Prediction> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| AppError::LLMApi(format!("Replicate poll failed: {}", e)))?;
        Self::decode(response).await
    }

    async fn decode(response: reqwest::Response) -> AppResult<Prediction> {
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::LLMApi(format!(
                "Replicate API error ({}): {}",
                status, error_text
            )));
        }
        response
            .json()
            .await
            .map_err(|e| AppError::LLMApi(format!("Failed to parse Replicate response: {}", e)))
    }
}

#[async_trait]
impl LLMAdapter for ReplicateAdapter {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        let url = format!("{}/models/{}/predictions", self.api_base, request.model);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_token)
            .header("Prefer", "wait")
            .json(&Self::build_input(request))
            .send()
            .await
            .map_err(|e| AppError::LLMApi(format!("Replicate request failed: {}", e)))?;

        let mut prediction = Self::decode(response).await?;
        let poll_url = prediction
            .urls
            .as_ref()
            .and_then(|u| u.get.clone())
            .unwrap_or_else(|| format!("{}/predictions/{}", self.api_base, prediction.id));

        let mut polls = 0;
        while matches!(prediction.status.as_str(), "starting" | "processing") {
            if polls >= MAX_POLLS {
                return Err(AppError::LLMApi(format!(
                    "Replicate prediction {} did not finish",
                    prediction.id
                )));
            }
            polls += 1;
            debug!(prediction_id = %prediction.id, status = %prediction.status, "Waiting for prediction");
            tokio::time::sleep(self.poll_interval).await;
            prediction = self.fetch(&poll_url).await?;
        }

        if prediction.status != "succeeded" {
            let reason = prediction
                .error
                .map(|e| match e {
                    Value::String(s) => s,
                    other => other.to_string(),
                })
                .unwrap_or_else(|| prediction.status.clone());
            return Err(AppError::LLMApi(format!("Replicate prediction failed: {}", reason)));
        }

        let usage = prediction
            .metrics
            .map(|m| {
                let prompt_tokens = m.input_token_count.unwrap_or(0);
                let completion_tokens = m.output_token_count.unwrap_or(0);
                TokenUsage {
                    prompt_tokens,
                    completion_tokens,
                    total_tokens: prompt_tokens + completion_tokens,
                }
            })
            .unwrap_or_default();

        Ok(LLMResponse {
            content: Self::output_text(&prediction.output),
            finish_reason: "stop".to_string(),
            usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LLMMessage;

    fn request(messages: Vec<LLMMessage>) -> LLMRequest {
        LLMRequest {
            provider: "replicate".to_string(),
            model: "openai/o4-mini".to_string(),
            messages,
            max_tokens: None,
            temperature: None,
            system_instruction: Some("You route ARGO questions.".to_string()),
        }
    }

    #[test]
    fn test_build_input_single_prompt() {
        let input = ReplicateAdapter::build_input(&request(vec![LLMMessage::user("Tell me about ARGO.")]));
        assert_eq!(input["input"]["prompt"], "Tell me about ARGO.");
        assert_eq!(input["input"]["system_prompt"], "You route ARGO questions.");
        assert!(input["input"].get("messages").is_none());
    }

    #[test]
    fn test_build_input_conversation() {
        let input = ReplicateAdapter::build_input(&request(vec![
            LLMMessage::user("hi"),
            LLMMessage::assistant("hello"),
            LLMMessage::user("what floats are active?"),
        ]));
        assert_eq!(input["input"]["prompt"], "what floats are active?");
        assert_eq!(input["input"]["messages"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_output_text_concatenates_fragments() {
        let output = json!(["{\"type\": ", "\"reply\"}"]);
        assert_eq!(ReplicateAdapter::output_text(&output), "{\"type\": \"reply\"}");
        assert_eq!(ReplicateAdapter::output_text(&Value::Null), "");
    }

    #[tokio::test]
    async fn test_prediction_polls_until_succeeded() {
        let mut server = mockito::Server::new_async().await;
        let poll_url = format!("{}/predictions/p1", server.url());

        server
            .mock("POST", "/models/openai/o4-mini/predictions")
            .match_header("prefer", "wait")
            .with_status(201)
            .with_body(
                json!({ "id": "p1", "status": "processing", "output": null, "urls": { "get": poll_url } })
                    .to_string(),
            )
            .create_async()
            .await;
        server
            .mock("GET", "/predictions/p1")
            .with_status(200)
            .with_body(
                json!({ "id": "p1", "status": "succeeded", "output": ["Hello", " ocean"],
                        "metrics": { "input_token_count": 3, "output_token_count": 2 } })
                    .to_string(),
            )
            .create_async()
            .await;

        let adapter = ReplicateAdapter::new_with_api_base("r8_test", &server.url())
            .with_poll_interval(Duration::from_millis(1));
        let response = adapter
            .create_chat_completion(&request(vec![LLMMessage::user("hi")]))
            .await
            .unwrap();

        assert_eq!(response.content, "Hello ocean");
        assert_eq!(response.usage.total_tokens, 5);
    }

    #[tokio::test]
    async fn test_failed_prediction_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/models/openai/o4-mini/predictions")
            .with_status(201)
            .with_body(json!({ "id": "p2", "status": "failed", "error": "model crashed" }).to_string())
            .create_async()
            .await;

        let adapter = ReplicateAdapter::new_with_api_base("r8_test", &server.url());
        let err = adapter
            .create_chat_completion(&request(vec![LLMMessage::user("hi")]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("model crashed"));
    }
}
