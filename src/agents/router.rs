use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Reply,
    /// Kept for router outputs from older prompts; handled as `Reply`.
    Vector,
    Web,
    Research,
    Analyse,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Reply => "reply",
            Action::Vector => "vector",
            Action::Web => "web",
            Action::Research => "research",
            Action::Analyse => "analyse",
        }
    }

    /// Whether the action runs a tool branch instead of terminating.
    pub fn is_tool(&self) -> bool {
        matches!(self, Action::Web | Action::Research | Action::Analyse)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reply" => Ok(Action::Reply),
            "vector" => Ok(Action::Vector),
            "web" => Ok(Action::Web),
            "research" => Ok(Action::Research),
            "analyse" | "analyze" => Ok(Action::Analyse),
            other => Err(AppError::Routing(format!("unknown action type '{}'", other))),
        }
    }
}

/// The router's `{"type": ..., "output": ...}` answer.
#[derive(Debug, Clone, PartialEq)]
pub struct RouterDecision {
    pub action: Action,
    pub output: String,
}

/// Locate a JSON object in model output: the whole text, a fenced block, or
/// the span between the first `{` and the last `}`.
fn find_json_object(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed);

    if unfenced.starts_with('{') && unfenced.ends_with('}') {
        return Some(unfenced);
    }
    let start = unfenced.find('{')?;
    let end = unfenced.rfind('}')?;
    (end > start).then(|| &unfenced[start..=end])
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl RouterDecision {
    /// Parse router output. Text without a parseable JSON object, including
    /// prose that merely contains braces, is taken as a reply. A parsed object
    /// must name a known `type`.
    pub fn parse(raw: &str) -> AppResult<Self> {
        let value = find_json_object(raw)
            .and_then(|candidate| serde_json::from_str::<Value>(candidate).ok())
            .filter(Value::is_object);
        let Some(value) = value else {
            return Ok(Self {
                action: Action::Reply,
                output: raw.trim().to_string(),
            });
        };

        let action = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::Routing("router output has no 'type' field".to_string()))?
            .parse()?;

        Ok(Self {
            action,
            output: value.get("output").map(value_text).unwrap_or_default(),
        })
    }
}

/// The `output` field of a router-style JSON answer, or the raw text when it
/// has none.
pub fn output_or_raw(raw: &str) -> String {
    find_json_object(raw)
        .and_then(|candidate| serde_json::from_str::<Value>(candidate).ok())
        .and_then(|value| value.get("output").map(value_text))
        .unwrap_or_else(|| raw.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_json() {
        let decision = RouterDecision::parse(r#"{"type": "web", "output": "latest ARGO deployment 2025"}"#).unwrap();
        assert_eq!(decision.action, Action::Web);
        assert_eq!(decision.output, "latest ARGO deployment 2025");
    }

    #[test]
    fn test_parse_fenced_and_embedded_json() {
        let fenced = "```json\n{\"type\": \"analyse\", \"output\": \"mean salinity by year\"}\n```";
        assert_eq!(RouterDecision::parse(fenced).unwrap().action, Action::Analyse);

        let embedded = "Sure! {\"type\": \"research\", \"output\": \"float lifetime\"} Hope that helps.";
        let decision = RouterDecision::parse(embedded).unwrap();
        assert_eq!(decision.action, Action::Research);
        assert_eq!(decision.output, "float lifetime");
    }

    #[test]
    fn test_parse_plain_text_is_reply() {
        let decision = RouterDecision::parse("  ARGO is a global array of profiling floats.  ").unwrap();
        assert_eq!(decision.action, Action::Reply);
        assert_eq!(decision.output, "ARGO is a global array of profiling floats.");
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            RouterDecision::parse(r#"{"type": "dance", "output": "x"}"#),
            Err(AppError::Routing(_))
        ));
        assert!(matches!(
            RouterDecision::parse(r#"{"output": "x"}"#),
            Err(AppError::Routing(_))
        ));
    }

    #[test]
    fn test_parse_prose_with_braces_is_reply() {
        let decision = RouterDecision::parse("Salinity is reported in {PSU} practical units.").unwrap();
        assert_eq!(decision.action, Action::Reply);
        assert_eq!(decision.output, "Salinity is reported in {PSU} practical units.");

        let broken = RouterDecision::parse(r#" {"type": "reply", "output": } "#).unwrap();
        assert_eq!(broken.action, Action::Reply);
        assert_eq!(broken.output, r#"{"type": "reply", "output": }"#);
    }

    #[test]
    fn test_action_aliases_and_tools() {
        assert_eq!("Analyze".parse::<Action>().unwrap(), Action::Analyse);
        assert!(Action::Web.is_tool());
        assert!(!Action::Vector.is_tool());
        assert_eq!(serde_json::to_string(&Action::Research).unwrap(), "\"research\"");
    }

    #[test]
    fn test_output_or_raw() {
        assert_eq!(output_or_raw(r#"{"type":"reply","output":"Ocean Salinity Trends"}"#), "Ocean Salinity Trends");
        assert_eq!(output_or_raw("Ocean Salinity Trends"), "Ocean Salinity Trends");
        assert_eq!(output_or_raw(r#"{"title": "x"}"#), r#"{"title": "x"}"#);
    }
}
