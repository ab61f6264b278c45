// Groq serves an OpenAI-compatible endpoint, so this wraps the OpenAI adapter.

use crate::llm::provider::LLMAdapter;
use crate::types::{AppResult, LLMRequest, LLMResponse};
use async_trait::async_trait;
use futures::stream::BoxStream;

const GROQ_API_BASE: &str = "https://api.groq.com/openai/v1";

pub struct GroqAdapter {
    inner: crate::llm::openai::OpenAIAdapter,
}

impl GroqAdapter {
    pub fn new(api_key: &str) -> Self {
        Self::new_with_api_base(api_key, GROQ_API_BASE)
    }

    pub fn new_with_api_base(api_key: &str, api_base: &str) -> Self {
        Self {
            inner: crate::llm::openai::OpenAIAdapter::new_with_api_base(api_key, api_base),
        }
    }
}

#[async_trait]
impl LLMAdapter for GroqAdapter {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        self.inner.create_chat_completion(request).await
    }

    async fn create_chat_completion_stream(&self, request: &LLMRequest) -> AppResult<BoxStream<'static, AppResult<String>>> {
        self.inner.create_chat_completion_stream(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::{LLMProviderConfig, LLM};
    use crate::types::LLMMessage;

    #[test]
    fn test_default_api_base() {
        assert_eq!(GROQ_API_BASE, "https://api.groq.com/openai/v1");
    }

    #[tokio::test]
    async fn test_provider_routes_to_chat_completions() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer gsk-test")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({"model": "llama-3.3-70b-versatile"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"message":{"content":"Floats surface every ten days."},"finish_reason":"stop"}]}"#)
            .create_async()
            .await;

        let llm = LLM::new(LLMProviderConfig {
            name: "groq".to_string(),
            api_key: Some("gsk-test".to_string()),
            api_base: Some(server.url()),
        })
        .unwrap();
        let response = llm
            .create_chat_completion(&LLMRequest {
                provider: "groq".to_string(),
                model: "llama-3.3-70b-versatile".to_string(),
                messages: vec![LLMMessage::user("How deep do floats go?")],
                max_tokens: None,
                temperature: None,
                system_instruction: None,
            })
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(llm.provider_name(), "groq");
        assert_eq!(response.content, "Floats surface every ten days.");
    }
}
