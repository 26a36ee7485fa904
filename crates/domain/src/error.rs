//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`PageRuleError`] via `#[from]` or an explicit `From` impl.

use crate::id::{ActionId, RuleId};

/// Boxed source error for collaborator and persistence failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Workspace-wide error.
#[derive(Debug, thiserror::Error)]
pub enum PageRuleError {
    #[error("validation error")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error("rule {rule_id} is inactive")]
    Inactive { rule_id: RuleId },

    #[error("element not found for selector '{selector}'")]
    ElementNotFound { selector: String },

    #[error("element '{selector}' does not accept input")]
    NotEditable { selector: String },

    #[error("invalid pattern")]
    InvalidPattern(#[from] crate::pattern::PatternError),

    #[error(transparent)]
    ActionFailure(#[from] ActionFailure),

    #[error("invalid state transition")]
    InvalidTransition(#[from] crate::execution::TransitionError),

    #[error("persistence failure")]
    Persistence(#[source] BoxError),

    #[error("collaborator error")]
    Collaborator(#[source] BoxError),
}

impl PageRuleError {
    /// Wrap an arbitrary collaborator (environment, AI, notifier) error.
    pub fn collaborator(err: impl Into<BoxError>) -> Self {
        Self::Collaborator(err.into())
    }
}

/// Render `err` and its source chain on one line, outermost first.
#[must_use]
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}

/// Domain invariant violations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("a rule needs at least one action")]
    NoActions,

    #[error("unknown ai operation '{0}'")]
    UnknownAiOperation(String),
}

/// A lookup by id found nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

/// An action failed while an execution was running.
#[derive(Debug, thiserror::Error)]
#[error("action {action_id} failed")]
pub struct ActionFailure {
    pub action_id: ActionId,
    #[source]
    pub source: Box<PageRuleError>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_display_not_found_with_entity_and_id() {
        let err = NotFoundError {
            entity: "Rule",
            id: "abc".to_string(),
        };
        assert_eq!(err.to_string(), "Rule abc not found");
    }

    #[test]
    fn should_keep_source_when_wrapping_action_failure() {
        let failure = ActionFailure {
            action_id: ActionId::new(),
            source: Box::new(PageRuleError::ElementNotFound {
                selector: "#go".to_string(),
            }),
        };
        let err: PageRuleError = failure.into();
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(
            source.as_deref(),
            Some("element not found for selector '#go'")
        );
    }

    #[test]
    fn should_render_source_chain() {
        let err = PageRuleError::from(ValidationError::EmptyName);
        assert_eq!(
            error_chain(&err),
            "validation error: name must not be empty"
        );
    }

    #[test]
    fn should_wrap_collaborator_errors() {
        let err = PageRuleError::collaborator("backend offline");
        assert!(matches!(err, PageRuleError::Collaborator(_)));
    }
}
