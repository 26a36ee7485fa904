//! Action — one step of effect execution within a rule.

use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ValidationError;
use crate::id::ActionId;

/// Default pause for a `wait` action without a usable duration.
pub const DEFAULT_WAIT_MS: u64 = 1000;

/// An operation executed when a rule fires.
///
/// `delay_ms` is applied after the action completes successfully, before
/// the next action starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    #[serde(default)]
    pub id: ActionId,
    #[serde(flatten)]
    pub kind: ActionKind,
    #[serde(default, alias = "delay", skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,
}

/// The closed set of things an action can do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionKind {
    /// Scroll an element into view and click it.
    Click { selector: String },
    /// Set the value of an input-capable element.
    Fill { selector: String, value: String },
    /// Go to `url`, in the current frame or a new tab.
    Navigate {
        url: String,
        #[serde(default)]
        new_tab: bool,
    },
    /// Collect the trimmed text of every element matching `selector`.
    Extract { selector: String },
    /// Run the page content through the AI collaborator.
    ///
    /// `operation` is kept as text so an unknown operation surfaces as an
    /// execution error instead of a load failure.
    AiProcess { operation: String },
    /// Show a notification.
    Notify { message: String },
    /// Persist the current page.
    Save {
        #[serde(default)]
        tags: Vec<String>,
    },
    /// Pause the sequence.
    Wait {
        #[serde(default, deserialize_with = "lenient_millis")]
        duration_ms: Option<u64>,
    },
}

impl Action {
    /// Create an action with a fresh id and no delay.
    #[must_use]
    pub fn new(kind: ActionKind) -> Self {
        Self {
            id: ActionId::new(),
            kind,
            delay_ms: None,
        }
    }

    #[must_use]
    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = Some(delay_ms);
        self
    }
}

impl ActionKind {
    /// Wire name of the action type.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Click { .. } => "click",
            Self::Fill { .. } => "fill",
            Self::Navigate { .. } => "navigate",
            Self::Extract { .. } => "extract",
            Self::AiProcess { .. } => "ai_process",
            Self::Notify { .. } => "notify",
            Self::Save { .. } => "save",
            Self::Wait { .. } => "wait",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ActionKind::Click { selector } => write!(f, "click({selector})"),
            ActionKind::Fill { selector, .. } => write!(f, "fill({selector})"),
            ActionKind::Navigate { url, .. } => write!(f, "navigate({url})"),
            ActionKind::Extract { selector } => write!(f, "extract({selector})"),
            ActionKind::AiProcess { operation } => write!(f, "ai_process({operation})"),
            ActionKind::Notify { .. } => f.write_str("notify"),
            ActionKind::Save { .. } => f.write_str("save"),
            ActionKind::Wait { duration_ms } => {
                write!(f, "wait({}ms)", duration_ms.unwrap_or(DEFAULT_WAIT_MS))
            }
        }
    }
}

/// Operations understood by the AI collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiOperation {
    Summarize,
    ExtractEntities,
    AnalyzeSentiment,
}

impl AiOperation {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Summarize => "summarize",
            Self::ExtractEntities => "extract_entities",
            Self::AnalyzeSentiment => "analyze_sentiment",
        }
    }
}

impl FromStr for AiOperation {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "summarize" => Ok(Self::Summarize),
            "extract_entities" => Ok(Self::ExtractEntities),
            "analyze_sentiment" => Ok(Self::AnalyzeSentiment),
            other => Err(ValidationError::UnknownAiOperation(other.to_string())),
        }
    }
}

/// Overall tone reported by the AI collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

/// Accept a duration given as a number or a numeric string; anything else
/// becomes `None` so the default applies.
fn lenient_millis<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|value| match value {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_display_actions() {
        let a = Action::new(ActionKind::Click {
            selector: "#buy".to_string(),
        });
        assert_eq!(a.to_string(), "click(#buy)");
        let w = Action::new(ActionKind::Wait { duration_ms: None });
        assert_eq!(w.to_string(), "wait(1000ms)");
    }

    #[test]
    fn should_deserialize_flat_tagged_action() {
        let json = serde_json::json!({
            "type": "fill",
            "selector": "#email",
            "value": "me@example.com",
            "delay_ms": 200
        });
        let a: Action = serde_json::from_value(json).unwrap();
        assert!(matches!(a.kind, ActionKind::Fill { ref value, .. } if value == "me@example.com"));
        assert_eq!(a.delay_ms, Some(200));
    }

    #[test]
    fn should_read_delay_alias() {
        let json = serde_json::json!({"type": "wait", "duration_ms": 10, "delay": 300});
        let a: Action = serde_json::from_value(json).unwrap();
        assert_eq!(a.delay_ms, Some(300));
    }

    #[test]
    fn should_assign_id_when_missing() {
        let json = serde_json::json!({"type": "notify", "message": "hi"});
        let a: Action = serde_json::from_value(json.clone()).unwrap();
        let b: Action = serde_json::from_value(json).unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn should_default_navigate_to_same_tab() {
        let json = serde_json::json!({"type": "navigate", "url": "https://example.com"});
        let a: Action = serde_json::from_value(json).unwrap();
        assert!(matches!(a.kind, ActionKind::Navigate { new_tab: false, .. }));
    }

    #[test]
    fn should_accept_numeric_string_wait_duration() {
        let json = serde_json::json!({"type": "wait", "duration_ms": "250"});
        let a: Action = serde_json::from_value(json).unwrap();
        assert_eq!(
            a.kind,
            ActionKind::Wait {
                duration_ms: Some(250)
            }
        );
    }

    #[test]
    fn should_drop_invalid_wait_duration() {
        let json = serde_json::json!({"type": "wait", "duration_ms": "soon"});
        let a: Action = serde_json::from_value(json).unwrap();
        assert_eq!(a.kind, ActionKind::Wait { duration_ms: None });
    }

    #[test]
    fn should_reject_unknown_action_type() {
        let json = serde_json::json!({"type": "teleport"});
        assert!(serde_json::from_value::<Action>(json).is_err());
    }

    #[test]
    fn should_parse_ai_operations() {
        assert_eq!(
            "summarize".parse::<AiOperation>().unwrap(),
            AiOperation::Summarize
        );
        assert_eq!(
            "translate".parse::<AiOperation>(),
            Err(ValidationError::UnknownAiOperation("translate".to_string()))
        );
    }

    #[test]
    fn should_roundtrip_action_through_serde_json() {
        let a = Action::new(ActionKind::Save {
            tags: vec!["news".to_string()],
        })
        .with_delay_ms(50);
        let json = serde_json::to_string(&a).unwrap();
        let parsed: Action = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, a);
    }

    #[test]
    fn should_name_action_types() {
        let a = ActionKind::AiProcess {
            operation: "summarize".to_string(),
        };
        assert_eq!(a.name(), "ai_process");
    }
}
