//! SerpAPI Client
//!
//! Google Light search through SerpAPI. Used as the web backend when
//! `SEARCH_PROVIDER=serpapi`; returns snippets rather than full page text.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use serpapi_search_rust::serp_api_search::SerpApiSearch;
use tracing::{debug, info};

use super::{SearchError, WebDocument, WebSearch};

pub struct SerpApiClient {
    api_key: String,
    max_results: usize,
}

impl SerpApiClient {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            max_results: 10,
        }
    }

    pub fn from_config(config: &crate::config::SearchConfig) -> Option<Self> {
        if config.serpapi_key.is_empty() {
            return None;
        }
        Some(Self::new(config.serpapi_key.clone()).with_max_results(config.max_results))
    }

    pub fn with_max_results(mut self, max: usize) -> Self {
        self.max_results = max;
        self
    }

    /// Map SerpAPI `organic_results` into documents.
    fn parse_organic_results(results: &Value, max_results: usize) -> Result<Vec<WebDocument>, SearchError> {
        let organic_results = results.get("organic_results").ok_or(SearchError::NoResults)?;

        let results_array = organic_results
            .as_array()
            .ok_or_else(|| SearchError::ParseError("Expected array of results".to_string()))?;

        if results_array.is_empty() {
            return Err(SearchError::NoResults);
        }

        let documents = results_array
            .iter()
            .take(max_results)
            .map(|result| {
                let str_field = |key: &str| result.get(key).and_then(|v| v.as_str()).map(String::from);
                let url = str_field("link").unwrap_or_default();
                WebDocument {
                    title: str_field("title").unwrap_or_else(|| "Untitled".to_string()),
                    text: str_field("snippet").unwrap_or_default(),
                    source: str_field("source").or_else(|| url.split('/').nth(2).map(String::from)),
                    published: str_field("date"),
                    url,
                }
            })
            .collect();

        Ok(documents)
    }
}

#[async_trait]
impl WebSearch for SerpApiClient {
    fn name(&self) -> &'static str {
        "serpapi"
    }

    async fn search(&self, query: &str) -> Result<Vec<WebDocument>, SearchError> {
        info!(query = %query, "Searching Google Light via SerpAPI");

        let mut params = HashMap::<String, String>::new();
        params.insert("engine".to_string(), "google_light".to_string());
        params.insert("q".to_string(), query.to_string());
        params.insert("hl".to_string(), "en".to_string());
        params.insert("gl".to_string(), "us".to_string());
        params.insert("num".to_string(), self.max_results.to_string());

        let search = SerpApiSearch::google(params, self.api_key.clone());
        let results = search
            .json()
            .await
            .map_err(|e| SearchError::RequestFailed(e.to_string()))?;

        debug!("Raw Light response received");

        let documents = Self::parse_organic_results(&results, self.max_results)?;
        info!(count = documents.len(), "Google Light search completed");
        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_organic_results() {
        let raw = json!({
            "organic_results": [
                { "title": "Argo float data", "link": "https://www.aoml.noaa.gov/argo/", "snippet": "Real-time profiles", "date": "Mar 3, 2025" },
                { "link": "https://argo.ucsd.edu/about", "source": "Argo", "snippet": "About Argo" },
                { "title": "third", "link": "https://x.org" }
            ]
        });
        let docs = SerpApiClient::parse_organic_results(&raw, 2).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].source.as_deref(), Some("www.aoml.noaa.gov"));
        assert_eq!(docs[0].published.as_deref(), Some("Mar 3, 2025"));
        assert_eq!(docs[1].title, "Untitled");
        assert_eq!(docs[1].source.as_deref(), Some("Argo"));
    }

    #[test]
    fn test_parse_missing_results() {
        let err = SerpApiClient::parse_organic_results(&json!({}), 5).unwrap_err();
        assert!(matches!(err, SearchError::NoResults));

        let err = SerpApiClient::parse_organic_results(&json!({ "organic_results": "oops" }), 5).unwrap_err();
        assert!(matches!(err, SearchError::ParseError(_)));
    }
}
