//! Research branch: a deep research task whose report goes into the tool log.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::agents::graph::AgentTool;
use crate::search::{DeepResearch, SearchError};
use crate::types::AppResult;

pub struct ResearchTool {
    research: Arc<dyn DeepResearch>,
}

impl ResearchTool {
    pub fn new(research: Arc<dyn DeepResearch>) -> Self {
        Self { research }
    }
}

#[async_trait]
impl AgentTool for ResearchTool {
    async fn run(&self, query: &str) -> AppResult<String> {
        let report = self.research.research(query).await?;
        if report.trim().is_empty() {
            return Err(SearchError::NoResults.into());
        }
        info!(report_len = report.len(), "Research report received");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedResearch(&'static str);

    #[async_trait]
    impl DeepResearch for FixedResearch {
        async fn research(&self, _instructions: &str) -> Result<String, SearchError> {
            Ok(self.0.to_string())
        }
    }

    #[tokio::test]
    async fn test_report_is_returned() {
        let tool = ResearchTool::new(Arc::new(FixedResearch("Floats last 4-5 years.")));
        assert_eq!(tool.run("float lifetime").await.unwrap(), "Floats last 4-5 years.");
    }

    #[tokio::test]
    async fn test_empty_report_is_an_error() {
        let tool = ResearchTool::new(Arc::new(FixedResearch("  ")));
        assert!(tool.run("float lifetime").await.is_err());
    }
}
