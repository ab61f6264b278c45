//! Helpers for study mode: chart detection, reply cleanup and line splitting
//! for streamed answers.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

const CHART_KEYWORDS: [&str; 8] = [
    "plot",
    "chart",
    "graph",
    "visualize",
    "bar chart",
    "histogram",
    "scatter",
    "line graph",
];

/// Whether a message asks for a visualization.
pub fn wants_chart(message: &str) -> bool {
    let message = message.to_lowercase();
    CHART_KEYWORDS.iter().any(|keyword| message.contains(keyword))
}

/// The `output` field when the reply is a JSON object, else the reply itself.
pub fn clean_reply(raw: &str) -> String {
    if raw.starts_with('{') {
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(raw) {
            match map.get("output") {
                Some(Value::String(s)) => return s.clone(),
                Some(other) if !other.is_null() => return other.to_string(),
                _ => {}
            }
        }
    }
    raw.to_string()
}

fn numbered_point() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\d{1,3}\.\s+").expect("valid numbered point regex"))
}

fn bullet_point() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[-•]\s+").expect("valid bullet regex"))
}

/// Insert a newline before every match that does not already start a line.
fn break_before(text: &str, re: &Regex) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    let mut last = 0;
    for m in re.find_iter(text) {
        out.push_str(&text[last..m.start()]);
        if !out.ends_with('\n') {
            out.push('\n');
        }
        last = m.start();
    }
    out.push_str(&text[last..]);
    out
}

/// Split an answer into the lines sent as stream events: numbered points and
/// bullets each start a new line, blank lines are dropped.
pub fn format_for_stream(text: &str) -> Vec<String> {
    let processed = break_before(text, numbered_point());
    let processed = break_before(&processed, bullet_point());
    processed
        .trim()
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}
