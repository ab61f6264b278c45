//! Agent System
//!
//! The chat assistant is a small routing graph. A router persona reads the
//! conversation plus every tool log gathered so far and picks the next step:
//!
//! ```text
//!                 ┌──────────────┐
//!   messages ───▶ │    start     │ ──reply──▶ response
//!                 │   (router)   │
//!                 └──────────────┘
//!                   │    │     │
//!              web  │    │     │ analyse
//!                   ▼    │     ▼
//!        ┌──────────┐    │   ┌───────────┐
//!        │ Exa/Serp │    │   │ SQL → plot│
//!        │ +infer   │    │   └───────────┘
//!        └──────────┘    │ research
//!                        ▼
//!                 ┌──────────────┐
//!                 │ Exa Research │
//!                 └──────────────┘
//! ```
//!
//! Every tool appends to the tool logs and hands control back to the router.

pub mod prompts;
pub mod router;
pub mod graph;
pub mod web;
pub mod research;
pub mod analysis;
pub mod study;
pub mod title;

pub use analysis::{AnalysisAgent, AnalysisOutcome, DataSnapshot, SharedSnapshot};
pub use graph::{AgentGraph, AgentRun, AgentTool, ToolLog};
pub use router::{Action, RouterDecision};

use std::sync::Arc;

use sqlx::SqlitePool;
use tracing::info;

use crate::analysis::PlotStore;
use crate::config::Config;
use crate::llm::TextAgent;
use crate::types::AppResult;

/// Every agent the HTTP layer talks to, built once at startup.
#[derive(Clone)]
pub struct Agents {
    pub router: TextAgent,
    /// Router persona with a short token cap, for chat titles.
    pub titler: TextAgent,
    /// Plain chat persona for streaming mode.
    pub chat: TextAgent,
    pub graph: Arc<AgentGraph>,
    pub analysis: Arc<AnalysisAgent>,
}

impl Agents {
    pub fn from_config(
        config: &Config,
        pool: SqlitePool,
        plots: PlotStore,
        snapshot: SharedSnapshot,
    ) -> AppResult<Self> {
        let llm = &config.llm;
        let router = TextAgent::from_config("router", llm, &llm.router, prompts::ROUTER_PROMPT)?;
        let chat = TextAgent::from_config("chat", llm, &llm.chat, prompts::CHAT_PROMPT)?;
        let sql_coder = TextAgent::from_config("sql_coder", llm, &llm.sql, prompts::SQL_PROMPT)?;
        let viz = TextAgent::from_config("visualizer", llm, &llm.viz, prompts::VIZ_PROMPT)?;

        let sandbox = crate::sandbox::from_config(&config.sandbox);
        let analysis = Arc::new(
            AnalysisAgent::new(sql_coder, viz, pool, plots, snapshot)
                .with_sandbox(sandbox)
                .with_max_rows(config.database.analysis_max_rows),
        );

        let mut graph = AgentGraph::new(router.clone(), config.agent.max_steps)
            .with_analyse(analysis.clone());

        if let Some(search) = crate::search::web_search_from_config(&config.search) {
            let inferencer = TextAgent::from_config("inferencer", llm, &llm.inferencer, prompts::INFERENCER_PROMPT)?;
            graph = graph.with_web(Arc::new(web::WebSearchTool::new(search, inferencer)));
        }
        if let Some(deep) = crate::search::research_from_config(&config.search) {
            graph = graph.with_research(Arc::new(research::ResearchTool::new(deep)));
        }

        info!(
            router = %llm.router.model,
            sql = %llm.sql.model,
            viz = %llm.viz.model,
            max_steps = config.agent.max_steps,
            "Agents initialized"
        );

        Ok(Self {
            titler: title::title_agent(&router),
            router,
            chat,
            graph: Arc::new(graph),
            analysis,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_agents_build_without_credentials() {
        let config = Config::for_tests("sqlite::memory:");
        let pool = crate::db::test_pool().await;
        let dir = tempfile::tempdir().unwrap();

        let agents = Agents::from_config(&config, pool, PlotStore::new(dir.path()), SharedSnapshot::default());
        let agents = agents.unwrap();
        assert_eq!(agents.router.name(), "router");
        assert_eq!(agents.chat.name(), "chat");
    }
}
