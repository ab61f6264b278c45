use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::{CodeSandbox, SandboxError, SandboxFile, SandboxRun, PLOT_FILE};
use crate::config::SandboxConfig;

const SCRIPT_FILE: &str = "script.py";

/// Runs scripts with a local interpreter inside a throwaway directory.
pub struct LocalSandbox {
    interpreter: PathBuf,
    timeout: Duration,
}

impl LocalSandbox {
    pub fn new(interpreter: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            interpreter: interpreter.into(),
            timeout,
        }
    }

    pub fn from_config(config: &SandboxConfig) -> Self {
        Self::new(&config.python, Duration::from_secs(config.timeout_secs))
    }
}

#[async_trait]
impl CodeSandbox for LocalSandbox {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn run_python(&self, code: &str, files: &[SandboxFile]) -> Result<SandboxRun, SandboxError> {
        let workdir = tempfile::tempdir()?;
        for file in files {
            tokio::fs::write(workdir.path().join(&file.name), &file.contents).await?;
        }
        tokio::fs::write(workdir.path().join(SCRIPT_FILE), code).await?;

        debug!(dir = %workdir.path().display(), "Running script in local sandbox");

        let child = Command::new(&self.interpreter)
            .arg(SCRIPT_FILE)
            .current_dir(workdir.path())
            .env("MPLBACKEND", "Agg")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                SandboxError::Unavailable(format!("cannot start {}: {}", self.interpreter.display(), e))
            })?;

        // Dropping the future on timeout drops the child, which kills it.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs(), "Local sandbox timed out");
                return Err(SandboxError::Timeout(self.timeout.as_secs()));
            }
        };

        let artifact = tokio::fs::read(workdir.path().join(PLOT_FILE)).await.ok();
        let run = SandboxRun {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
            artifact,
        };

        info!(
            exit_code = ?run.exit_code,
            artifact_bytes = run.artifact.as_ref().map(|a| a.len()).unwrap_or(0),
            "Local sandbox finished"
        );
        Ok(run)
    }
}
