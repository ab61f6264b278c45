use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tokio::sync::RwLock;

use crate::agents::analysis::NamedLog;
use crate::agents::{Agents, SharedSnapshot, ToolLog};
use crate::analysis::PlotStore;
use crate::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Config,
    pub agents: Agents,
    /// Conversation posted to `/api/stream`, consumed by the SSE reader.
    pub history: Arc<RwLock<Option<ChatHistory>>>,
    pub snapshot: SharedSnapshot,
    pub plots: PlotStore,
}

impl AppState {
    pub fn new(pool: SqlitePool, config: Config, agents: Agents, snapshot: SharedSnapshot, plots: PlotStore) -> Self {
        Self {
            pool,
            config,
            agents,
            history: Arc::default(),
            snapshot,
            plots,
        }
    }
}

// Rows written by the ingest job. Column names follow the `Data` and
// `Observation` tables.

/// Per-profile metadata; one `Data` row per NetCDF file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileMeta {
    pub platform_number: Option<i64>,
    pub project_name: String,
    pub pi_name: String,
    pub cycle_num: Option<i64>,
    pub data_centre: String,
    pub data_mode: String,
    pub float_no: Option<i64>,
    pub firmware: Option<i64>,
    pub platform_type: String,
    pub juld: Option<NaiveDateTime>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub position_system: String,
}

/// One measured level. The text columns hold JSON arrays of strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservationRow {
    pub pressure: Option<f64>,
    pub temp: Option<f64>,
    pub psal: Option<f64>,
    pub station_param: String,
    pub equation: String,
    pub coefficient: String,
    pub comment: String,
    pub history_software: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatHistory {
    #[serde(default)]
    pub messages: Vec<ChatTurn>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StudyRequest {
    pub message: String,
}

/// Study answers carry either routing-graph tool logs or analysis steps.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum StudyLog {
    Tool(ToolLog),
    Step(NamedLog),
}

#[derive(Debug, Clone, Serialize)]
pub struct StudyResponse {
    pub response: String,
    /// True when the chart was drawn by sandboxed plotting code.
    pub sandbox: bool,
    pub sandbox_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plot_url: Option<String>,
    pub tool_logs: Vec<StudyLog>,
}

fn default_mode() -> String {
    "chat".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenameRequest {
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub bot: String,
    #[serde(default = "default_mode")]
    pub mode: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenameResponse {
    pub title: String,
}

/// `/img` payload: the latest plot as base64 PNG.
#[derive(Debug, Clone, Serialize)]
pub struct ImageResponse {
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub database: String,
    pub profiles: Option<i64>,
}
