//! Code execution sandboxes for visualizer-generated Python.
//!
//! Scripts run with their input files in the working directory and are
//! expected to save `my_plot.png` there.

pub mod daytona;
pub mod local;

use std::sync::Arc;
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use thiserror::Error;
use tracing::warn;

use crate::config::SandboxConfig;

pub use daytona::DaytonaSandbox;
pub use local::LocalSandbox;

/// File the generated code is told to save its chart to.
pub const PLOT_FILE: &str = "my_plot.png";

/// Smaller artifacts are treated as failed renders.
pub const MIN_PLOT_BYTES: usize = 1000;

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("sandbox unavailable: {0}")]
    Unavailable(String),

    #[error("sandbox request failed: {0}")]
    Request(String),

    #[error("execution timed out after {0}s")]
    Timeout(u64),

    #[error("sandbox I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// An input file placed next to the script.
#[derive(Debug, Clone)]
pub struct SandboxFile {
    pub name: String,
    pub contents: Vec<u8>,
}

impl SandboxFile {
    pub fn new(name: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            contents: contents.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SandboxRun {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    /// Contents of `my_plot.png` after the run, if it was written.
    pub artifact: Option<Vec<u8>>,
}

impl SandboxRun {
    /// The plot, if the script produced a usable one.
    pub fn plot(&self) -> Option<&[u8]> {
        self.artifact
            .as_deref()
            .filter(|bytes| bytes.len() >= MIN_PLOT_BYTES)
    }
}

#[async_trait]
pub trait CodeSandbox: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run_python(&self, code: &str, files: &[SandboxFile]) -> Result<SandboxRun, SandboxError>;
}

fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| Regex::new(r"```(?:python|py)?[ \t]*\n?").expect("valid fence regex"))
}

/// Strip markdown code fences from model output.
pub fn clean_code(raw: &str) -> String {
    fence_regex().replace_all(raw.trim(), "").trim().to_string()
}

/// Build the configured sandbox. `none` (or a Daytona setup without a key)
/// disables execution and analysis falls back to native charts.
pub fn from_config(config: &SandboxConfig) -> Option<Arc<dyn CodeSandbox>> {
    match config.provider.as_str() {
        "local" => Some(Arc::new(LocalSandbox::from_config(config))),
        "daytona" => match DaytonaSandbox::from_config(config) {
            Some(sandbox) => Some(Arc::new(sandbox)),
            None => {
                warn!("SANDBOX_PROVIDER=daytona but DAYTONA_API_KEY is empty, sandbox disabled");
                None
            }
        },
        "none" | "" => None,
        other => {
            warn!(provider = %other, "Unknown sandbox provider, sandbox disabled");
            None
        }
    }
}
