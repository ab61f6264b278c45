//! Exa Client
//!
//! - `/search` with `contents.text` for web search with page text
//! - `/research/v1` for asynchronous deep research tasks, polled until done
//!
//! API Reference: https://docs.exa.ai/reference

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::time::Instant;
use tracing::{debug, info};

use super::{DeepResearch, SearchError, WebDocument, WebSearch};
use crate::config::SearchConfig;

pub struct ExaClient {
    client: Client,
    api_key: String,
    base_url: String,
    max_results: usize,
    research_model: String,
    poll_interval: Duration,
    research_timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResult {
    #[serde(default)]
    title: Option<String>,
    url: String,
    #[serde(default)]
    published_date: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResearchTask {
    research_id: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    output: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

impl ExaClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: "https://api.exa.ai".to_string(),
            max_results: 5,
            research_model: "exa-research".to_string(),
            poll_interval: Duration::from_secs(5),
            research_timeout: Duration::from_secs(600),
        }
    }

    pub fn from_config(config: &SearchConfig) -> Option<Self> {
        if config.exa_api_key.is_empty() {
            return None;
        }
        Some(
            Self::new(config.exa_api_key.clone())
                .with_base_url(&config.exa_base_url)
                .with_max_results(config.max_results)
                .with_research(
                    &config.research_model,
                    Duration::from_secs(config.research_poll_secs),
                    Duration::from_secs(config.research_timeout_secs),
                ),
        )
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_max_results(mut self, max: usize) -> Self {
        self.max_results = max;
        self
    }

    pub fn with_research(mut self, model: &str, poll_interval: Duration, timeout: Duration) -> Self {
        self.research_model = model.to_string();
        self.poll_interval = poll_interval;
        self.research_timeout = timeout;
        self
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, SearchError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(SearchError::RequestFailed(format!("Exa API error ({}): {}", status, body)))
    }

    async fn create_research(&self, instructions: &str) -> Result<ResearchTask, SearchError> {
        let response = self
            .client
            .post(format!("{}/research/v1", self.base_url))
            .header("x-api-key", &self.api_key)
            .json(&json!({ "instructions": instructions, "model": self.research_model }))
            .send()
            .await
            .map_err(|e| SearchError::RequestFailed(e.to_string()))?;

        Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| SearchError::ParseError(e.to_string()))
    }

    async fn get_research(&self, research_id: &str) -> Result<ResearchTask, SearchError> {
        let response = self
            .client
            .get(format!("{}/research/v1/{}", self.base_url, research_id))
            .header("x-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| SearchError::RequestFailed(e.to_string()))?;

        Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| SearchError::ParseError(e.to_string()))
    }

    /// Pull the report text out of a finished research task.
    fn research_report(output: Option<Value>) -> String {
        match output {
            Some(Value::Object(map)) => match map.get("content") {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => map
                    .get("parsed")
                    .map(|p| p.to_string())
                    .unwrap_or_default(),
            },
            Some(Value::String(s)) => s,
            Some(other) => other.to_string(),
            None => String::new(),
        }
    }
}

#[async_trait]
impl WebSearch for ExaClient {
    fn name(&self) -> &'static str {
        "exa"
    }

    async fn search(&self, query: &str) -> Result<Vec<WebDocument>, SearchError> {
        info!(query = %query, "Searching the web via Exa");

        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .header("x-api-key", &self.api_key)
            .json(&json!({
                "query": query,
                "type": "auto",
                "numResults": self.max_results,
                "contents": { "text": true }
            }))
            .send()
            .await
            .map_err(|e| SearchError::RequestFailed(e.to_string()))?;

        let parsed: SearchResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| SearchError::ParseError(e.to_string()))?;

        if parsed.results.is_empty() {
            return Err(SearchError::NoResults);
        }

        let documents: Vec<WebDocument> = parsed
            .results
            .into_iter()
            .map(|r| WebDocument {
                title: r.title.filter(|t| !t.is_empty()).unwrap_or_else(|| "Untitled".to_string()),
                source: r.url.split('/').nth(2).map(String::from).or(r.author),
                url: r.url,
                text: r.text.unwrap_or_default(),
                published: r.published_date,
            })
            .collect();

        info!(count = documents.len(), "Exa search completed");
        Ok(documents)
    }
}

#[async_trait]
impl DeepResearch for ExaClient {
    async fn research(&self, instructions: &str) -> Result<String, SearchError> {
        let task = self.create_research(instructions).await?;
        let research_id = task.research_id;
        info!(research_id = %research_id, "Exa research task created");

        let deadline = Instant::now() + self.research_timeout;
        loop {
            let task = self.get_research(&research_id).await?;
            let status = task.status.as_deref().unwrap_or("pending");
            debug!(research_id = %research_id, status, "Polled research task");

            match status {
                "completed" => {
                    let report = Self::research_report(task.output);
                    info!(research_id = %research_id, report_len = report.len(), "Research completed");
                    return Ok(report);
                }
                "failed" | "canceled" => {
                    let reason = task
                        .error
                        .map(|e| match e {
                            Value::String(s) => s,
                            other => other.to_string(),
                        })
                        .unwrap_or_else(|| status.to_string());
                    return Err(SearchError::ResearchFailed(research_id, reason));
                }
                _ => {}
            }

            if Instant::now() >= deadline {
                return Err(SearchError::Timeout(research_id));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(server: &mockito::Server) -> ExaClient {
        ExaClient::new("exa-test")
            .with_base_url(&server.url())
            .with_research("exa-research", Duration::from_millis(1), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_search_maps_results() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/search")
            .match_header("x-api-key", "exa-test")
            .match_body(mockito::Matcher::PartialJson(json!({ "query": "latest argo deployment" })))
            .with_status(200)
            .with_body(
                json!({ "results": [
                    { "title": "Argo floats deployed", "url": "https://argo.ucsd.edu/news/1",
                      "publishedDate": "2025-01-02", "text": "Ten floats were deployed." },
                    { "title": "", "url": "https://example.org/x", "text": null }
                ]})
                .to_string(),
            )
            .create_async()
            .await;

        let docs = client(&server).search("latest argo deployment").await.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].source.as_deref(), Some("argo.ucsd.edu"));
        assert_eq!(docs[0].text, "Ten floats were deployed.");
        assert_eq!(docs[1].title, "Untitled");
    }

    #[tokio::test]
    async fn test_search_without_results() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/search")
            .with_status(200)
            .with_body(r#"{"results":[]}"#)
            .create_async()
            .await;

        let err = client(&server).search("nothing").await.unwrap_err();
        assert!(matches!(err, SearchError::NoResults));
    }

    #[tokio::test]
    async fn test_research_polls_until_completed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/research/v1")
            .with_status(201)
            .with_body(r#"{"researchId":"r1","status":"pending"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/research/v1/r1")
            .with_status(200)
            .with_body(r#"{"researchId":"r1","status":"running"}"#)
            .expect(1)
            .create_async()
            .await;
        server
            .mock("GET", "/research/v1/r1")
            .with_status(200)
            .with_body(r#"{"researchId":"r1","status":"completed","output":{"content":"Argo has ~4000 floats."}}"#)
            .create_async()
            .await;

        let report = client(&server).research("How many Argo floats exist?").await.unwrap();
        assert_eq!(report, "Argo has ~4000 floats.");
    }

    #[tokio::test]
    async fn test_research_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/research/v1")
            .with_status(201)
            .with_body(r#"{"researchId":"r2"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/research/v1/r2")
            .with_status(200)
            .with_body(r#"{"researchId":"r2","status":"failed","error":"quota exceeded"}"#)
            .create_async()
            .await;

        let err = client(&server).research("anything").await.unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[test]
    fn test_research_report_shapes() {
        assert_eq!(ExaClient::research_report(Some(json!({ "content": "report" }))), "report");
        assert_eq!(ExaClient::research_report(Some(json!("plain"))), "plain");
        assert_eq!(ExaClient::research_report(None), "");
    }
}
