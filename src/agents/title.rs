//! Chat titles for the sidebar.

use tracing::warn;

use crate::agents::prompts::title_prompt;
use crate::agents::router::output_or_raw;
use crate::llm::TextAgent;

pub const DEFAULT_TITLE: &str = "New Chat";
const MAX_TITLE_WORDS: usize = 5;
pub const TITLE_MAX_TOKENS: u32 = 32;

/// The router persona capped to title-sized answers.
pub fn title_agent(router: &TextAgent) -> TextAgent {
    router.clone().with_max_tokens(TITLE_MAX_TOKENS)
}

/// Trim a model answer down to the first line's first five words.
fn shorten(raw: &str) -> String {
    let text = output_or_raw(raw);
    let first_line = text.lines().next().unwrap_or_default();
    let words: Vec<&str> = first_line
        .split_whitespace()
        .take(MAX_TITLE_WORDS)
        .collect();
    if words.is_empty() {
        DEFAULT_TITLE.to_string()
    } else {
        words.join(" ").trim_matches('"').to_string()
    }
}

/// Ask the model for a short title; any failure yields `New Chat`.
pub async fn suggest_title(agent: &TextAgent, user: &str, bot: &str, mode: &str) -> String {
    let (user, bot) = (user.trim(), bot.trim());
    if user.is_empty() || bot.is_empty() {
        return DEFAULT_TITLE.to_string();
    }

    match agent.gen(&title_prompt(mode, user, bot)).await {
        Ok(raw) => shorten(&raw),
        Err(e) => {
            warn!(error = %e, mode = %mode, "Title generation failed");
            DEFAULT_TITLE.to_string()
        }
    }
}
