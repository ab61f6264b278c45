//! Analysis Agent
//!
//! Turns a data question into SQL, runs it read-only, then charts the result:
//! visualizer-written matplotlib code runs in the sandbox, and a native
//! `plotters` chart is drawn whenever that does not yield an image.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::agents::graph::AgentTool;
use crate::analysis::{render_png, ChartData, ChartKind, PlotInfo, PlotStore};
use crate::db;
use crate::llm::TextAgent;
use crate::sandbox::{clean_code, CodeSandbox, SandboxFile};
use crate::types::{AppError, AppResult};

const PREVIEW_ROWS: usize = 5;
const MIN_CODE_CHARS: usize = 20;
const NO_CHART: &str = "INVAL";

/// Result of the latest analysis query, served at `/data`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DataSnapshot {
    pub data: Vec<Vec<Value>>,
    pub cols: Vec<String>,
}

pub type SharedSnapshot = Arc<RwLock<DataSnapshot>>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedLog {
    pub name: String,
    pub output: String,
}

impl NamedLog {
    fn new(name: &str, output: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            output: output.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlotSource {
    Sandbox,
    Fallback,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisOutcome {
    pub demand: String,
    pub sql: String,
    pub columns: Vec<String>,
    pub row_count: usize,
    pub truncated: bool,
    pub preview: Vec<Vec<Value>>,
    /// False when the visualizer answered `INVAL`.
    pub chart_requested: bool,
    pub plot: Option<PlotInfo>,
    pub plot_source: Option<PlotSource>,
    pub logs: Vec<NamedLog>,
}

impl AnalysisOutcome {
    /// Text recorded in the agent graph's tool log.
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "SQL: {}\nRows: {}{}\nColumns: {}\nPreview: {}\n",
            self.sql,
            self.row_count,
            if self.truncated { " (truncated)" } else { "" },
            self.columns.join(", "),
            Value::from(self.preview.clone())
        );
        match &self.plot {
            Some(plot) => summary.push_str(&format!("Chart: generated and available at {}", plot.url)),
            None => summary.push_str("Chart: none"),
        }
        summary
    }
}

/// Strip markdown fences from generated SQL.
pub fn clean_sql(raw: &str) -> String {
    let trimmed = raw.trim();
    let body = trimmed
        .strip_prefix("```sqlite")
        .or_else(|| trimmed.strip_prefix("```sql"))
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    body.trim().trim_end_matches("```").trim().to_string()
}

pub struct AnalysisAgent {
    sql_coder: TextAgent,
    viz: TextAgent,
    pool: SqlitePool,
    sandbox: Option<Arc<dyn CodeSandbox>>,
    plots: PlotStore,
    snapshot: SharedSnapshot,
    max_rows: usize,
}

impl AnalysisAgent {
    pub fn new(
        sql_coder: TextAgent,
        viz: TextAgent,
        pool: SqlitePool,
        plots: PlotStore,
        snapshot: SharedSnapshot,
    ) -> Self {
        Self {
            sql_coder,
            viz,
            pool,
            sandbox: None,
            plots,
            snapshot,
            max_rows: 1000,
        }
    }

    pub fn with_sandbox(mut self, sandbox: Option<Arc<dyn CodeSandbox>>) -> Self {
        self.sandbox = sandbox;
        self
    }

    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows;
        self
    }

    async fn run_in_sandbox(
        &self,
        code: &str,
        snapshot: &DataSnapshot,
        logs: &mut Vec<NamedLog>,
    ) -> AppResult<Option<Vec<u8>>> {
        let Some(sandbox) = &self.sandbox else {
            logs.push(NamedLog::new("server_execution", "No sandbox configured, drawing fallback chart"));
            return Ok(None);
        };
        if code.len() < MIN_CODE_CHARS {
            logs.push(NamedLog::new("server_execution", "Visualizer code too short, drawing fallback chart"));
            return Ok(None);
        }

        let files = [SandboxFile::new("data.json", serde_json::to_vec(snapshot)?)];
        match sandbox.run_python(code, &files).await {
            Ok(run) => match run.plot() {
                Some(png) => {
                    logs.push(NamedLog::new(
                        "server_execution",
                        format!(
                            "Generated chart using {} sandbox with {} data points",
                            sandbox.name(),
                            snapshot.data.len()
                        ),
                    ));
                    Ok(Some(png.to_vec()))
                }
                None => {
                    let stderr_tail: String = run.stderr.lines().rev().take(3).collect::<Vec<_>>().join(" | ");
                    logs.push(NamedLog::new(
                        "server_execution",
                        format!(
                            "Visualizer code produced no plot (exit code {:?}) {}",
                            run.exit_code, stderr_tail
                        ),
                    ));
                    Ok(None)
                }
            },
            Err(e) => {
                warn!(error = %e, "Sandbox execution failed");
                logs.push(NamedLog::new("server_execution", format!("ERROR: {}", e)));
                Ok(None)
            }
        }
    }

    async fn fallback_chart(&self, demand: &str, snapshot: &DataSnapshot) -> AppResult<Vec<u8>> {
        let kind = ChartKind::from_request(demand);
        let data = ChartData::from_rows(&snapshot.cols, &snapshot.data);
        let title: String = demand.chars().take(80).collect();

        tokio::task::spawn_blocking(move || render_png(kind, &data, &title))
            .await
            .map_err(|e| AppError::Internal(format!("chart task failed: {}", e)))?
            .map_err(|e| AppError::Internal(format!("chart rendering failed: {:#}", e)))
    }

    /// Answer a data question with a query result and, when useful, a chart.
    pub async fn analyse(&self, demand: &str) -> AppResult<AnalysisOutcome> {
        info!(demand = %demand, "Analysis started");
        let mut logs = Vec::new();

        let sql = clean_sql(&self.sql_coder.gen(demand).await?);
        let result = db::run_readonly(&self.pool, &sql, self.max_rows).await?;
        logs.push(NamedLog::new(
            "database_query",
            format!("Executed: {}\nFound {} records", sql, result.row_count()),
        ));

        let snapshot = DataSnapshot {
            data: result.rows.clone(),
            cols: result.columns.clone(),
        };
        *self.snapshot.write().await = snapshot.clone();

        let preview: Vec<Vec<Value>> = result.rows.iter().take(PREVIEW_ROWS).cloned().collect();
        let mut outcome = AnalysisOutcome {
            demand: demand.to_string(),
            sql,
            columns: result.columns,
            row_count: result.rows.len(),
            truncated: result.truncated,
            preview,
            chart_requested: true,
            plot: None,
            plot_source: None,
            logs: Vec::new(),
        };

        let viz_input = json!({
            "prompt": demand,
            "schema": outcome.columns,
            "data_preview": outcome.preview,
        })
        .to_string();

        let code = match self.viz.gen(&viz_input).await {
            Ok(code) if code.trim() == NO_CHART => {
                logs.push(NamedLog::new("visualization", "No visualization needed for this request"));
                outcome.chart_requested = false;
                outcome.logs = logs;
                return Ok(outcome);
            }
            Ok(code) => clean_code(&code),
            Err(e) => {
                warn!(error = %e, "Visualizer failed");
                logs.push(NamedLog::new("visualization", format!("ERROR: {}", e)));
                String::new()
            }
        };

        let mut png = self.run_in_sandbox(&code, &snapshot, &mut logs).await?;
        if png.is_some() {
            outcome.plot_source = Some(PlotSource::Sandbox);
        } else {
            match self.fallback_chart(demand, &snapshot).await {
                Ok(bytes) => {
                    png = Some(bytes);
                    outcome.plot_source = Some(PlotSource::Fallback);
                }
                Err(e) => {
                    warn!(error = %e, "Fallback chart failed");
                    logs.push(NamedLog::new("fallback_chart", format!("ERROR: {}", e)));
                }
            }
        }

        if let Some(png) = png {
            let plot = self.plots.save(&png).await?;
            logs.push(NamedLog::new(
                "visualization",
                format!("Chart saved as {} ({} bytes)", plot.url, plot.bytes),
            ));
            outcome.plot = Some(plot);
        }

        info!(
            rows = outcome.row_count,
            plot = outcome.plot.is_some(),
            source = ?outcome.plot_source,
            "Analysis finished"
        );
        outcome.logs = logs;
        Ok(outcome)
    }
}

#[async_trait]
impl AgentTool for AnalysisAgent {
    async fn run(&self, query: &str) -> AppResult<String> {
        Ok(self.analyse(query).await?.summary())
    }
}
