// Daytona remote sandbox.
// API Reference: https://www.daytona.io/docs/en/tools/api/

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{multipart, Client};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use super::{CodeSandbox, SandboxError, SandboxFile, SandboxRun, PLOT_FILE};
use crate::config::SandboxConfig;

const WORKDIR: &str = "/home/daytona";
const SCRIPT_FILE: &str = "script.py";
const MAX_START_POLLS: u32 = 60;

pub struct DaytonaSandbox {
    client: Client,
    api_key: String,
    api_url: String,
    timeout: Duration,
    poll_interval: Duration,
}

#[derive(Debug, Deserialize)]
struct Sandbox {
    id: String,
    #[serde(default)]
    state: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteResponse {
    #[serde(default)]
    exit_code: Option<i32>,
    #[serde(default)]
    result: String,
}

impl DaytonaSandbox {
    pub fn new(api_key: &str, api_url: &str, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            api_url: api_url.trim_end_matches('/').to_string(),
            timeout,
            poll_interval: Duration::from_secs(1),
        }
    }

    pub fn from_config(config: &SandboxConfig) -> Option<Self> {
        if config.daytona_api_key.is_empty() {
            return None;
        }
        Some(Self::new(
            &config.daytona_api_key,
            &config.daytona_api_url,
            Duration::from_secs(config.timeout_secs),
        ))
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn toolbox(&self, sandbox_id: &str, path: &str) -> String {
        format!("{}/toolbox/{}/toolbox/{}", self.api_url, sandbox_id, path)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, SandboxError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(SandboxError::Request(format!("Daytona API error ({}): {}", status, body)))
    }

    async fn create(&self) -> Result<Sandbox, SandboxError> {
        let response = self
            .client
            .post(format!("{}/sandbox", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&json!({ "language": "python" }))
            .send()
            .await
            .map_err(|e| SandboxError::Unavailable(e.to_string()))?;
        let mut sandbox: Sandbox = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| SandboxError::Request(e.to_string()))?;

        let mut polls = 0;
        while sandbox.state.as_deref().is_some_and(|s| s != "started") {
            if matches!(sandbox.state.as_deref(), Some("error") | Some("build_failed")) || polls >= MAX_START_POLLS {
                return Err(SandboxError::Unavailable(format!(
                    "sandbox {} did not start ({:?})",
                    sandbox.id, sandbox.state
                )));
            }
            polls += 1;
            tokio::time::sleep(self.poll_interval).await;
            let response = self
                .client
                .get(format!("{}/sandbox/{}", self.api_url, sandbox.id))
                .bearer_auth(&self.api_key)
                .send()
                .await
                .map_err(|e| SandboxError::Request(e.to_string()))?;
            sandbox = Self::check(response)
                .await?
                .json()
                .await
                .map_err(|e| SandboxError::Request(e.to_string()))?;
        }
        Ok(sandbox)
    }

    async fn upload(&self, sandbox_id: &str, name: &str, contents: Vec<u8>) -> Result<(), SandboxError> {
        let form = multipart::Form::new().part("file", multipart::Part::bytes(contents).file_name(name.to_string()));
        let response = self
            .client
            .post(self.toolbox(sandbox_id, "files/upload"))
            .bearer_auth(&self.api_key)
            .query(&[("path", format!("{}/{}", WORKDIR, name))])
            .multipart(form)
            .send()
            .await
            .map_err(|e| SandboxError::Request(e.to_string()))?;
        Self::check(response).await?;
        Ok(())
    }

    async fn execute(&self, sandbox_id: &str) -> Result<ExecuteResponse, SandboxError> {
        let request = self
            .client
            .post(self.toolbox(sandbox_id, "process/execute"))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "command": format!("python3 {}", SCRIPT_FILE),
                "cwd": WORKDIR,
                "timeout": self.timeout.as_secs(),
            }))
            .send();

        let response = tokio::time::timeout(self.timeout + Duration::from_secs(5), request)
            .await
            .map_err(|_| SandboxError::Timeout(self.timeout.as_secs()))?
            .map_err(|e| SandboxError::Request(e.to_string()))?;

        Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| SandboxError::Request(e.to_string()))
    }

    async fn download(&self, sandbox_id: &str, name: &str) -> Result<Option<Vec<u8>>, SandboxError> {
        let response = self
            .client
            .get(self.toolbox(sandbox_id, "files/download"))
            .bearer_auth(&self.api_key)
            .query(&[("path", format!("{}/{}", WORKDIR, name))])
            .send()
            .await
            .map_err(|e| SandboxError::Request(e.to_string()))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let bytes = Self::check(response)
            .await?
            .bytes()
            .await
            .map_err(|e| SandboxError::Request(e.to_string()))?;
        Ok(Some(bytes.to_vec()))
    }

    async fn delete(&self, sandbox_id: &str) {
        let result = self
            .client
            .delete(format!("{}/sandbox/{}", self.api_url, sandbox_id))
            .bearer_auth(&self.api_key)
            .query(&[("force", "true")])
            .send()
            .await;
        if let Err(e) = result {
            warn!(sandbox_id = %sandbox_id, error = %e, "Failed to delete Daytona sandbox");
        }
    }

    async fn run_in(&self, sandbox_id: &str, code: &str, files: &[SandboxFile]) -> Result<SandboxRun, SandboxError> {
        for file in files {
            self.upload(sandbox_id, &file.name, file.contents.clone()).await?;
        }
        self.upload(sandbox_id, SCRIPT_FILE, code.as_bytes().to_vec()).await?;

        let executed = self.execute(sandbox_id).await?;
        debug!(sandbox_id = %sandbox_id, exit_code = ?executed.exit_code, "Daytona execution finished");

        let artifact = self.download(sandbox_id, PLOT_FILE).await?;
        Ok(SandboxRun {
            stdout: executed.result,
            stderr: String::new(),
            exit_code: executed.exit_code,
            artifact,
        })
    }
}

#[async_trait]
impl CodeSandbox for DaytonaSandbox {
    fn name(&self) -> &'static str {
        "daytona"
    }

    async fn run_python(&self, code: &str, files: &[SandboxFile]) -> Result<SandboxRun, SandboxError> {
        let sandbox = self.create().await?;
        info!(sandbox_id = %sandbox.id, "Daytona sandbox created");

        let result = self.run_in(&sandbox.id, code, files).await;
        self.delete(&sandbox.id).await;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn test_full_run_downloads_plot_and_deletes() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/sandbox")
            .match_header("authorization", "Bearer dtn_test")
            .with_status(200)
            .with_body(r#"{"id":"sb1","state":"started"}"#)
            .create_async()
            .await;
        let uploads = server
            .mock("POST", "/toolbox/sb1/toolbox/files/upload")
            .match_query(Matcher::Any)
            .with_status(200)
            .expect(2)
            .create_async()
            .await;
        server
            .mock("POST", "/toolbox/sb1/toolbox/process/execute")
            .match_body(Matcher::PartialJson(json!({ "command": "python3 script.py" })))
            .with_status(200)
            .with_body(r#"{"exitCode":0,"result":"saved"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/toolbox/sb1/toolbox/files/download")
            .match_query(Matcher::UrlEncoded("path".into(), "/home/daytona/my_plot.png".into()))
            .with_status(200)
            .with_body(vec![7u8; 1500])
            .create_async()
            .await;
        let deleted = server
            .mock("DELETE", "/sandbox/sb1")
            .match_query(Matcher::Any)
            .with_status(200)
            .create_async()
            .await;

        let sandbox = DaytonaSandbox::new("dtn_test", &server.url(), Duration::from_secs(5));
        let run = sandbox
            .run_python("print('saved')", &[SandboxFile::new("data.json", b"{}".to_vec())])
            .await
            .unwrap();

        assert_eq!(run.stdout, "saved");
        assert_eq!(run.exit_code, Some(0));
        assert_eq!(run.plot().map(|p| p.len()), Some(1500));
        uploads.assert_async().await;
        deleted.assert_async().await;
    }

    #[tokio::test]
    async fn test_execution_error_still_deletes() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/sandbox")
            .with_status(200)
            .with_body(r#"{"id":"sb2","state":"started"}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/toolbox/sb2/toolbox/files/upload")
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body("disk full")
            .create_async()
            .await;
        let deleted = server
            .mock("DELETE", "/sandbox/sb2")
            .match_query(Matcher::Any)
            .with_status(200)
            .create_async()
            .await;

        let sandbox = DaytonaSandbox::new("dtn_test", &server.url(), Duration::from_secs(5));
        let err = sandbox.run_python("print(1)", &[]).await.unwrap_err();
        assert!(err.to_string().contains("disk full"));
        deleted.assert_async().await;
    }
}
