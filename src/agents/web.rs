//! Web branch: search, then condense the results with the inferencer.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::agents::graph::AgentTool;
use crate::llm::TextAgent;
use crate::search::{format_documents, WebSearch};
use crate::types::AppResult;

pub struct WebSearchTool {
    search: Arc<dyn WebSearch>,
    inferencer: TextAgent,
}

impl WebSearchTool {
    pub fn new(search: Arc<dyn WebSearch>, inferencer: TextAgent) -> Self {
        Self { search, inferencer }
    }

    fn inferencer_prompt(query: &str, information: &str) -> String {
        format!("@ USER QUERY\n{}\n\n@ INFORMATION\n{}", query, information)
    }
}

#[async_trait]
impl AgentTool for WebSearchTool {
    async fn run(&self, query: &str) -> AppResult<String> {
        let documents = self.search.search(query).await?;
        info!(engine = self.search.name(), documents = documents.len(), "Condensing web results");

        let prompt = Self::inferencer_prompt(query, &format_documents(&documents));
        self.inferencer.gen(&prompt).await
    }
}
