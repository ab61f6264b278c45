//! A single-purpose LLM persona: one model, one fixed system prompt.
//!
//! Every agent in the routing graph (router, inferencer, SQL coder, visualizer)
//! is a `TextAgent` with a different prompt.

use futures::stream::BoxStream;
use tracing::debug;

use crate::config::{LLMConfig, ModelConfig};
use crate::llm::provider::{LLMProviderConfig, LLM};
use crate::types::{AppResult, LLMMessage, LLMRequest};

#[derive(Clone)]
pub struct TextAgent {
    name: &'static str,
    llm: LLM,
    model: String,
    system_prompt: String,
    max_tokens: Option<u32>,
}

impl TextAgent {
    pub fn new(name: &'static str, llm: LLM, model: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            name,
            llm,
            model: model.into(),
            system_prompt: system_prompt.into(),
            max_tokens: None,
        }
    }

    pub fn from_config(
        name: &'static str,
        llm_config: &LLMConfig,
        role: &ModelConfig,
        system_prompt: impl Into<String>,
    ) -> AppResult<Self> {
        let llm = LLM::new(LLMProviderConfig {
            name: role.provider.clone(),
            api_key: llm_config.api_key_for(&role.provider),
            api_base: llm_config.api_base.clone(),
        })?;
        Ok(Self::new(name, llm, role.model.clone(), system_prompt))
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn request(&self, messages: Vec<LLMMessage>) -> LLMRequest {
        LLMRequest {
            provider: self.llm.provider_name().to_string(),
            model: self.model.clone(),
            messages,
            max_tokens: self.max_tokens,
            temperature: None,
            system_instruction: Some(self.system_prompt.clone()),
        }
    }

    /// Generate a completion for a single prompt.
    pub async fn gen(&self, prompt: &str) -> AppResult<String> {
        debug!(agent = self.name, prompt_len = prompt.len(), "Agent generating");
        let response = self
            .llm
            .create_chat_completion(&self.request(vec![LLMMessage::user(prompt)]))
            .await?;
        debug!(agent = self.name, response_len = response.content.len(), "Agent responded");
        Ok(response.content)
    }

    /// Stream a completion for a whole conversation.
    pub async fn chat_stream(
        &self,
        messages: Vec<LLMMessage>,
    ) -> AppResult<BoxStream<'static, AppResult<String>>> {
        debug!(agent = self.name, turns = messages.len(), "Agent streaming");
        self.llm.create_chat_completion_stream(&self.request(messages)).await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted adapter shared by agent tests.

    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use crate::llm::provider::{LLMAdapter, LLM};
    use crate::types::{AppError, AppResult, LLMRequest, LLMResponse};

    /// Replays canned replies in order and records every request it sees.
    #[derive(Clone, Default)]
    pub struct ScriptedAdapter {
        replies: Arc<Mutex<VecDeque<AppResult<String>>>>,
        pub requests: Arc<Mutex<Vec<LLMRequest>>>,
    }

    impl ScriptedAdapter {
        pub fn new<I, S>(replies: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            Self {
                replies: Arc::new(Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect())),
                requests: Arc::default(),
            }
        }

        pub fn push_error(&self, message: &str) {
            self.replies
                .lock()
                .unwrap()
                .push_back(Err(AppError::LLMApi(message.to_string())));
        }

        pub fn llm(&self) -> LLM {
            LLM::from_adapter("scripted", Arc::new(self.clone()))
        }

        pub fn prompts(&self) -> Vec<String> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .map(|r| r.messages.last().map(|m| m.content.clone()).unwrap_or_default())
                .collect()
        }
    }

    #[async_trait]
    impl LLMAdapter for ScriptedAdapter {
        async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
            self.requests.lock().unwrap().push(request.clone());
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(AppError::LLMApi("script exhausted".to_string())))?;
            Ok(LLMResponse {
                content: reply,
                finish_reason: "stop".to_string(),
                usage: Default::default(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedAdapter;
    use super::*;

    #[tokio::test]
    async fn test_gen_sends_system_prompt_and_prompt() {
        let adapter = ScriptedAdapter::new(["SELECT 1"]);
        let agent = TextAgent::new("sql", adapter.llm(), "openai/gpt-5", "You are a SQL coder.");

        let out = agent.gen("average salinity").await.unwrap();
        assert_eq!(out, "SELECT 1");

        let requests = adapter.requests.lock().unwrap();
        assert_eq!(requests[0].model, "openai/gpt-5");
        assert_eq!(requests[0].system_instruction.as_deref(), Some("You are a SQL coder."));
        assert_eq!(requests[0].messages[0].content, "average salinity");
    }
}
