use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use tracing::warn;

use crate::types::{AppError, AppResult, LLMRequest, LLMResponse};

#[async_trait]
pub trait LLMAdapter: Send + Sync {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse>;

    /// Streams the completion as text deltas. Adapters without native streaming
    /// yield the whole completion as a single chunk.
    async fn create_chat_completion_stream(
        &self,
        request: &LLMRequest,
    ) -> AppResult<BoxStream<'static, AppResult<String>>> {
        let response = self.create_chat_completion(request).await?;
        Ok(futures::stream::once(async move { Ok(response.content) }).boxed())
    }
}

/// Configuration for LLM provider (renamed to avoid clashing with provider names elsewhere)
pub struct LLMProviderConfig {
    pub name: String,
    pub api_key: Option<String>,
    /// Replaces the default endpoint of the OpenAI-compatible providers.
    pub api_base: Option<String>,
}

/// Stand-in adapter used when a provider has no API key configured.
struct UnconfiguredAdapter {
    provider: String,
}

#[async_trait]
impl LLMAdapter for UnconfiguredAdapter {
    async fn create_chat_completion(&self, _request: &LLMRequest) -> AppResult<LLMResponse> {
        Err(AppError::LLMApi(format!(
            "no API key configured for provider '{}'",
            self.provider
        )))
    }
}

#[derive(Clone)]
pub struct LLM {
    adapter: Arc<dyn LLMAdapter>,
    provider_name: String,
}

impl LLM {
    pub fn new(provider: LLMProviderConfig) -> AppResult<Self> {
        let Some(api_key) = provider.api_key else {
            warn!(provider = %provider.name, "No LLM API key configured, calls will fail");
            return Ok(Self {
                adapter: Arc::new(UnconfiguredAdapter {
                    provider: provider.name.clone(),
                }),
                provider_name: provider.name,
            });
        };

        let api_base = provider.api_base.as_deref();
        let adapter: Arc<dyn LLMAdapter> = match provider.name.as_str() {
            "replicate" => Arc::new(crate::llm::replicate::ReplicateAdapter::new(&api_key)),
            "openai" => Arc::new(match api_base {
                Some(base) => crate::llm::openai::OpenAIAdapter::new_with_api_base(&api_key, base),
                None => crate::llm::openai::OpenAIAdapter::new(&api_key),
            }),
            "openrouter" => Arc::new(match api_base {
                Some(base) => crate::llm::openrouter::OpenRouterAdapter::new_with_api_base(&api_key, base),
                None => crate::llm::openrouter::OpenRouterAdapter::new(&api_key),
            }),
            "groq" => Arc::new(match api_base {
                Some(base) => crate::llm::groq::GroqAdapter::new_with_api_base(&api_key, base),
                None => crate::llm::groq::GroqAdapter::new(&api_key),
            }),
            "anthropic" => Arc::new(crate::llm::anthropic::AnthropicAdapter::new(&api_key)),
            other => {
                return Err(AppError::InvalidRequest(format!(
                    "Unsupported LLM provider: {}",
                    other
                )))
            }
        };

        Ok(Self {
            adapter,
            provider_name: provider.name,
        })
    }

    pub fn from_adapter(provider_name: impl Into<String>, adapter: Arc<dyn LLMAdapter>) -> Self {
        Self {
            adapter,
            provider_name: provider_name.into(),
        }
    }

    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    pub async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        self.adapter.create_chat_completion(request).await
    }

    pub async fn create_chat_completion_stream(
        &self,
        request: &LLMRequest,
    ) -> AppResult<BoxStream<'static, AppResult<String>>> {
        self.adapter.create_chat_completion_stream(request).await
    }
}
