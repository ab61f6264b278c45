//! Search Module
//!
//! Provides the web search and deep research backends used by the agent graph:
//! - Exa (primary) - neural web search with page contents, plus research tasks
//! - SerpAPI Google Light (alternative) - quick general web search
//!
//! Both engines implement [`WebSearch`]; only Exa implements [`DeepResearch`].

pub mod exa;
pub mod serpapi;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::config::SearchConfig;

pub use exa::ExaClient;
pub use serpapi::SerpApiClient;

/// Errors that can occur during search operations
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("{0} API key not configured")]
    NoApiKey(&'static str),

    #[error("Search request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse search results: {0}")]
    ParseError(String),

    #[error("No results found for query")]
    NoResults,

    #[error("Research task {0} failed: {1}")]
    ResearchFailed(String, String),

    #[error("Research task {0} timed out")]
    Timeout(String),
}

/// A single web page returned by a search engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebDocument {
    pub title: String,
    pub url: String,
    /// Page text or snippet
    pub text: String,
    pub published: Option<String>,
    pub source: Option<String>,
}

#[async_trait]
pub trait WebSearch: Send + Sync {
    fn name(&self) -> &'static str;

    async fn search(&self, query: &str) -> Result<Vec<WebDocument>, SearchError>;
}

#[async_trait]
pub trait DeepResearch: Send + Sync {
    /// Run a research task to completion and return its report.
    async fn research(&self, instructions: &str) -> Result<String, SearchError>;
}

/// Characters of page text kept per document when building prompts.
const MAX_DOCUMENT_CHARS: usize = 4000;

/// Render search results as plain text for the inferencer prompt.
pub fn format_documents(documents: &[WebDocument]) -> String {
    if documents.is_empty() {
        return "No search results.".to_string();
    }

    let mut output = String::new();
    for (i, doc) in documents.iter().enumerate() {
        output.push_str(&format!("[{}] {}\n", i + 1, doc.title));
        output.push_str(&format!("URL: {}\n", doc.url));
        if let Some(date) = &doc.published {
            output.push_str(&format!("Published: {}\n", date));
        }
        let text: String = doc.text.chars().take(MAX_DOCUMENT_CHARS).collect();
        output.push_str(text.trim());
        output.push_str("\n\n");
    }
    output
}

/// Build the configured web search backend, if its key is present.
pub fn web_search_from_config(config: &SearchConfig) -> Option<Arc<dyn WebSearch>> {
    match config.provider.as_str() {
        "serpapi" => SerpApiClient::from_config(config).map(|c| Arc::new(c) as Arc<dyn WebSearch>),
        "exa" => ExaClient::from_config(config).map(|c| Arc::new(c) as Arc<dyn WebSearch>),
        other => {
            warn!(provider = %other, "Unknown search provider, web search disabled");
            None
        }
    }
}

/// Build the deep research backend, if an Exa key is present.
pub fn research_from_config(config: &SearchConfig) -> Option<Arc<dyn DeepResearch>> {
    ExaClient::from_config(config).map(|c| Arc::new(c) as Arc<dyn DeepResearch>)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_documents_empty() {
        assert_eq!(format_documents(&[]), "No search results.");
    }

    #[test]
    fn test_format_documents_truncates_text() {
        let doc = WebDocument {
            title: "Argo Program".to_string(),
            url: "https://argo.ucsd.edu".to_string(),
            text: "x".repeat(MAX_DOCUMENT_CHARS + 100),
            published: Some("2024-05-01".to_string()),
            source: None,
        };
        let formatted = format_documents(&[doc]);
        assert!(formatted.starts_with("[1] Argo Program\nURL: https://argo.ucsd.edu\nPublished: 2024-05-01\n"));
        assert_eq!(formatted.matches('x').count(), MAX_DOCUMENT_CHARS);
    }

    #[test]
    fn test_backends_need_keys() {
        let config = crate::config::Config::for_tests("sqlite::memory:").search;
        assert!(web_search_from_config(&config).is_none());
        assert!(research_from_config(&config).is_none());
    }
}
