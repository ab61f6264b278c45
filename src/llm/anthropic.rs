// Anthropic Messages API adapter
// API Reference: https://docs.anthropic.com/en/api/messages

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::llm::provider::LLMAdapter;
use crate::types::{AppError, AppResult, LLMRequest, LLMResponse, TokenUsage};

const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

pub struct AnthropicAdapter {
    client: Client,
    api_key: String,
    api_base: String,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Message<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    usage: Usage,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

impl AnthropicAdapter {
    pub fn new(api_key: &str) -> Self {
        Self::new_with_api_base(api_key, ANTHROPIC_API_BASE)
    }

    pub fn new_with_api_base(api_key: &str, api_base: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    /// System turns are lifted into the top-level `system` field, which is the
    /// only place the Messages API accepts them.
    fn build_body(request: &LLMRequest) -> MessagesRequest<'_> {
        let mut system_parts: Vec<&str> = Vec::new();
        if let Some(system) = &request.system_instruction {
            system_parts.push(system);
        }
        let mut messages = Vec::new();
        for m in &request.messages {
            if m.role == "system" {
                system_parts.push(&m.content);
            } else {
                messages.push(Message {
                    role: &m.role,
                    content: &m.content,
                });
            }
        }

        MessagesRequest {
            model: &request.model,
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            system: if system_parts.is_empty() {
                None
            } else {
                Some(system_parts.join("\n\n"))
            },
            messages,
            temperature: request.temperature,
        }
    }
}

#[async_trait]
impl LLMAdapter for AnthropicAdapter {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        let url = format!("{}/messages", self.api_base);
        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&Self::build_body(request))
            .send()
            .await
            .map_err(|e| AppError::LLMApi(format!("Anthropic request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::LLMApi(format!(
                "Anthropic API error ({}): {}",
                status, error_text
            )));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| AppError::LLMApi(format!("Failed to parse Anthropic response: {}", e)))?;

        let content = parsed
            .content
            .into_iter()
            .filter(|b| b.block_type == "text")
            .filter_map(|b| b.text)
            .collect::<Vec<_>>()
            .join("");

        Ok(LLMResponse {
            content,
            finish_reason: parsed.stop_reason.unwrap_or_else(|| "end_turn".to_string()),
            usage: TokenUsage {
                prompt_tokens: parsed.usage.input_tokens,
                completion_tokens: parsed.usage.output_tokens,
                total_tokens: parsed.usage.input_tokens + parsed.usage.output_tokens,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LLMMessage;

    #[test]
    fn test_system_messages_are_lifted() {
        let request = LLMRequest {
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4".to_string(),
            messages: vec![LLMMessage::system("Extra rule."), LLMMessage::user("Plot salinity")],
            max_tokens: None,
            temperature: None,
            system_instruction: Some("You write matplotlib code.".to_string()),
        };
        let body = serde_json::to_value(AnthropicAdapter::build_body(&request)).unwrap();
        assert_eq!(body["system"], "You write matplotlib code.\n\nExtra rule.");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(body["max_tokens"], DEFAULT_MAX_TOKENS);
    }

    #[tokio::test]
    async fn test_text_blocks_are_joined() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/messages")
            .match_header("anthropic-version", ANTHROPIC_VERSION)
            .with_status(200)
            .with_body(
                r#"{"content":[{"type":"text","text":"import matplotlib"},{"type":"text","text":"\nplt.show()"}],
                    "stop_reason":"end_turn","usage":{"input_tokens":10,"output_tokens":4}}"#,
            )
            .create_async()
            .await;

        let adapter = AnthropicAdapter::new_with_api_base("key", &server.url());
        let request = LLMRequest {
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4".to_string(),
            messages: vec![LLMMessage::user("Plot salinity")],
            max_tokens: Some(512),
            temperature: None,
            system_instruction: None,
        };
        let response = adapter.create_chat_completion(&request).await.unwrap();
        assert_eq!(response.content, "import matplotlib\nplt.show()");
        assert_eq!(response.usage.total_tokens, 14);
    }
}
