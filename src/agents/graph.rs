//! Agent Routing Graph
//!
//! `start` asks the router what to do next; tool branches append one entry to
//! the tool log and return to `start`; `reply` ends the run.
//!
//! A tool the router picks twice in a row is not run again: the router is
//! re-prompted once to answer from the logs, then the latest log is returned.
//! Runs are capped at `max_steps` router passes.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::agents::router::{Action, RouterDecision};
use crate::llm::TextAgent;
use crate::types::AppResult;

/// One tool invocation as seen by the router on later passes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolLog {
    pub action: Action,
    pub query: String,
    pub info: String,
}

impl ToolLog {
    pub fn is_error(&self) -> bool {
        self.info.starts_with("ERROR:")
    }
}

/// A branch of the graph. Each tool turns the router's output into text for
/// the tool log.
#[async_trait]
pub trait AgentTool: Send + Sync {
    async fn run(&self, query: &str) -> AppResult<String>;
}

#[derive(Debug, Clone, Default)]
pub struct AgentState {
    pub messages: Vec<String>,
    /// Raw text of the latest router answer.
    pub output: String,
    pub tool_logs: Vec<ToolLog>,
    pub response: String,
    pub steps: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentRun {
    pub response: String,
    pub tool_logs: Vec<ToolLog>,
    pub steps: usize,
}

impl From<AgentState> for AgentRun {
    fn from(state: AgentState) -> Self {
        Self {
            response: state.response,
            tool_logs: state.tool_logs,
            steps: state.steps,
        }
    }
}

const NO_ANSWER: &str = "I couldn't find a good answer to that just now. Could you rephrase or narrow the question?";

#[derive(Clone)]
pub struct AgentGraph {
    router: TextAgent,
    web: Option<Arc<dyn AgentTool>>,
    research: Option<Arc<dyn AgentTool>>,
    analyse: Option<Arc<dyn AgentTool>>,
    max_steps: usize,
}

impl AgentGraph {
    pub fn new(router: TextAgent, max_steps: usize) -> Self {
        Self {
            router,
            web: None,
            research: None,
            analyse: None,
            max_steps: max_steps.max(1),
        }
    }

    pub fn with_web(mut self, tool: Arc<dyn AgentTool>) -> Self {
        self.web = Some(tool);
        self
    }

    pub fn with_research(mut self, tool: Arc<dyn AgentTool>) -> Self {
        self.research = Some(tool);
        self
    }

    pub fn with_analyse(mut self, tool: Arc<dyn AgentTool>) -> Self {
        self.analyse = Some(tool);
        self
    }

    fn tool(&self, action: Action) -> Option<&Arc<dyn AgentTool>> {
        match action {
            Action::Web => self.web.as_ref(),
            Action::Research => self.research.as_ref(),
            Action::Analyse => self.analyse.as_ref(),
            Action::Reply | Action::Vector => None,
        }
    }

    fn start_prompt(state: &AgentState, repeated: Option<Action>) -> AppResult<String> {
        let logs = serde_json::to_string_pretty(&state.tool_logs)?;
        let mut prompt = format!(
            "### CONVERSATION\n{}\n\n### TOOL LOGS\n{}\n",
            state.messages.join("\n"),
            logs
        );
        if let Some(action) = repeated {
            prompt.push_str(&format!(
                "\n### INSTRUCTION\nYou just called `{}` and its result is the last entry in the tool logs. \
                 Do not call it again. Reply to the user from the tool logs or pick a different action.\n",
                action
            ));
        }
        Ok(prompt)
    }

    /// Reply used when the run ends without the router replying.
    fn reply_from_logs(logs: &[ToolLog]) -> String {
        logs.iter()
            .rev()
            .find(|log| !log.is_error() && !log.info.trim().is_empty())
            .map(|log| log.info.clone())
            .unwrap_or_else(|| NO_ANSWER.to_string())
    }

    async fn run_tool(&self, action: Action, query: &str) -> ToolLog {
        info!(action = %action, query = %query, "Tool node entered");
        let info = match self.tool(action) {
            Some(tool) => match tool.run(query).await {
                Ok(info) => info,
                Err(e) => {
                    warn!(action = %action, error = %e, "Tool failed");
                    format!("ERROR: {}", e)
                }
            },
            None => format!("ERROR: the {} tool is not configured", action),
        };
        ToolLog {
            action,
            query: query.to_string(),
            info,
        }
    }

    /// Run the graph for a conversation until it replies.
    pub async fn invoke(&self, messages: Vec<String>) -> AppResult<AgentRun> {
        let mut state = AgentState {
            messages,
            ..Default::default()
        };
        let mut repeated: Option<Action> = None;

        loop {
            if state.steps >= self.max_steps {
                warn!(steps = state.steps, "Step limit reached, replying from tool logs");
                state.response = Self::reply_from_logs(&state.tool_logs);
                break;
            }
            state.steps += 1;

            debug!(step = state.steps, logs = state.tool_logs.len(), "Start node entered");
            state.output = self.router.gen(&Self::start_prompt(&state, repeated)?).await?;
            let decision = RouterDecision::parse(&state.output)?;
            info!(step = state.steps, action = %decision.action, "Router decided");

            if !decision.action.is_tool() {
                state.response = decision.output;
                break;
            }

            let last_action = state.tool_logs.last().map(|log| log.action);
            if last_action == Some(decision.action) {
                if repeated.is_none() {
                    warn!(action = %decision.action, "Router repeated a tool, asking it to reply");
                    repeated = Some(decision.action);
                    continue;
                }
                warn!(action = %decision.action, "Router repeated a tool again, replying from tool logs");
                state.response = Self::reply_from_logs(&state.tool_logs);
                break;
            }
            repeated = None;

            let log = self.run_tool(decision.action, &decision.output).await;
            state.tool_logs.push(log);
        }

        info!(
            steps = state.steps,
            tools = state.tool_logs.len(),
            response_len = state.response.len(),
            "Agent graph finished"
        );
        Ok(state.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::text_agent::testing::ScriptedAdapter;
    use crate::types::AppError;
    use std::sync::Mutex;

    struct EchoTool {
        calls: Mutex<Vec<String>>,
        fail: bool,
    }

    impl EchoTool {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                fail,
            })
        }
    }

    #[async_trait]
    impl AgentTool for EchoTool {
        async fn run(&self, query: &str) -> AppResult<String> {
            self.calls.lock().unwrap().push(query.to_string());
            if self.fail {
                Err(AppError::Internal("search backend down".to_string()))
            } else {
                Ok(format!("found: {}", query))
            }
        }
    }

    fn graph(adapter: &ScriptedAdapter, max_steps: usize) -> AgentGraph {
        AgentGraph::new(TextAgent::new("router", adapter.llm(), "openai/o4-mini", "route"), max_steps)
    }

    #[tokio::test]
    async fn test_direct_reply() {
        let adapter = ScriptedAdapter::new([r#"{"type":"reply","output":"ARGO is a float array."}"#]);
        let run = graph(&adapter, 6).invoke(vec!["Tell me about ARGO.".into()]).await.unwrap();

        assert_eq!(run.response, "ARGO is a float array.");
        assert!(run.tool_logs.is_empty());
        assert_eq!(run.steps, 1);
        assert!(adapter.prompts()[0].starts_with("### CONVERSATION\nTell me about ARGO.\n\n### TOOL LOGS\n[]"));
    }

    #[tokio::test]
    async fn test_prose_with_braces_ends_run_as_reply() {
        let adapter = ScriptedAdapter::new(["Floats measure the set {temperature, salinity} every cycle."]);
        let run = graph(&adapter, 6).invoke(vec!["What do floats measure?".into()]).await.unwrap();

        assert_eq!(run.response, "Floats measure the set {temperature, salinity} every cycle.");
        assert!(run.tool_logs.is_empty());
        assert_eq!(run.steps, 1);
    }

    #[tokio::test]
    async fn test_vector_is_treated_as_reply() {
        let adapter = ScriptedAdapter::new([r#"{"type":"vector","output":"Floats drift at 1000 m."}"#]);
        let run = graph(&adapter, 6).invoke(vec!["q".into()]).await.unwrap();
        assert_eq!(run.response, "Floats drift at 1000 m.");
    }

    #[tokio::test]
    async fn test_tool_then_reply_sees_logs() {
        let adapter = ScriptedAdapter::new([
            r#"{"type":"web","output":"latest argo event"}"#,
            r#"{"type":"reply","output":"The latest event was in May."}"#,
        ]);
        let web = EchoTool::new(false);
        let run = graph(&adapter, 6)
            .with_web(web.clone())
            .invoke(vec!["When was the most recent ARGO event?".into()])
            .await
            .unwrap();

        assert_eq!(run.response, "The latest event was in May.");
        assert_eq!(
            run.tool_logs,
            vec![ToolLog {
                action: Action::Web,
                query: "latest argo event".into(),
                info: "found: latest argo event".into()
            }]
        );
        assert_eq!(*web.calls.lock().unwrap(), vec!["latest argo event".to_string()]);
        assert!(adapter.prompts()[1].contains("found: latest argo event"));
    }

    #[tokio::test]
    async fn test_repeated_tool_is_not_rerun() {
        let adapter = ScriptedAdapter::new([
            r#"{"type":"research","output":"float lifetime"}"#,
            r#"{"type":"research","output":"float lifetime again"}"#,
            r#"{"type":"reply","output":"About five years."}"#,
        ]);
        let research = EchoTool::new(false);
        let run = graph(&adapter, 6)
            .with_research(research.clone())
            .invoke(vec!["How long do floats last?".into()])
            .await
            .unwrap();

        assert_eq!(run.response, "About five years.");
        assert_eq!(research.calls.lock().unwrap().len(), 1);
        assert!(adapter.prompts()[2].contains("Do not call it again"));
    }

    #[tokio::test]
    async fn test_repeated_twice_replies_from_logs() {
        let adapter = ScriptedAdapter::new([
            r#"{"type":"web","output":"a"}"#,
            r#"{"type":"web","output":"b"}"#,
            r#"{"type":"web","output":"c"}"#,
        ]);
        let web = EchoTool::new(false);
        let run = graph(&adapter, 6).with_web(web.clone()).invoke(vec!["q".into()]).await.unwrap();

        assert_eq!(run.response, "found: a");
        assert_eq!(web.calls.lock().unwrap().len(), 1);
        assert_eq!(run.steps, 3);
    }

    #[tokio::test]
    async fn test_tool_failure_is_logged_and_loop_continues() {
        let adapter = ScriptedAdapter::new([
            r#"{"type":"web","output":"argo news"}"#,
            r#"{"type":"reply","output":"Sorry, search is unavailable."}"#,
        ]);
        let run = graph(&adapter, 6)
            .with_web(EchoTool::new(true))
            .invoke(vec!["q".into()])
            .await
            .unwrap();

        assert!(run.tool_logs[0].is_error());
        assert!(run.tool_logs[0].info.contains("search backend down"));
        assert_eq!(run.response, "Sorry, search is unavailable.");
    }

    #[tokio::test]
    async fn test_unconfigured_tool_is_logged() {
        let adapter = ScriptedAdapter::new([
            r#"{"type":"analyse","output":"mean temp"}"#,
            r#"{"type":"reply","output":"No data access."}"#,
        ]);
        let run = graph(&adapter, 6).invoke(vec!["q".into()]).await.unwrap();
        assert_eq!(run.tool_logs[0].info, "ERROR: the analyse tool is not configured");
    }

    #[tokio::test]
    async fn test_step_limit() {
        let adapter = ScriptedAdapter::new([
            r#"{"type":"web","output":"one"}"#,
            r#"{"type":"research","output":"two"}"#,
            r#"{"type":"web","output":"three"}"#,
        ]);
        let run = graph(&adapter, 2)
            .with_web(EchoTool::new(false))
            .with_research(EchoTool::new(false))
            .invoke(vec!["q".into()])
            .await
            .unwrap();

        assert_eq!(run.steps, 2);
        assert_eq!(run.tool_logs.len(), 2);
        assert_eq!(run.response, "found: two");
        assert_eq!(adapter.prompts().len(), 2);
    }

    #[tokio::test]
    async fn test_router_failure_fails_run() {
        let adapter = ScriptedAdapter::new(Vec::<String>::new());
        adapter.push_error("rate limited");
        let err = graph(&adapter, 6).invoke(vec!["q".into()]).await.unwrap_err();
        assert!(err.to_string().contains("rate limited"));
    }
}
