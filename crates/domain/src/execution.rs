//! Execution — one realized run of a rule's action sequence.
//!
//! Both the execution and its per-action records are forward-only state
//! machines:
//!
//! ```text
//! execution: pending → running → completed | failed
//!            pending | running → cancelled
//! action:    pending → running → completed | failed
//!            pending → skipped
//! ```

use serde::{Deserialize, Serialize};

use crate::context::PageContext;
use crate::id::{ActionExecutionId, ActionId, ExecutionId, RuleId};
use crate::rule::AutomationRule;
use crate::time::{Timestamp, elapsed_ms};

/// A state change the machine does not allow.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot move from {from} to {to}")]
pub struct TransitionError {
    pub from: &'static str,
    pub to: &'static str,
}

/// Lifecycle of an [`AutomationExecution`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Running, Self::Completed | Self::Failed)
                | (Self::Pending | Self::Running, Self::Cancelled)
        )
    }

    fn transition(&mut self, next: Self) -> Result<(), TransitionError> {
        if !self.can_transition_to(next) {
            return Err(TransitionError {
                from: self.as_str(),
                to: next.as_str(),
            });
        }
        *self = next;
        Ok(())
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of an [`ActionExecution`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl ActionStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }

    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running | Self::Skipped)
                | (Self::Running, Self::Completed | Self::Failed)
        )
    }

    fn transition(&mut self, next: Self) -> Result<(), TransitionError> {
        if !self.can_transition_to(next) {
            return Err(TransitionError {
                from: self.as_str(),
                to: next.as_str(),
            });
        }
        *self = next;
        Ok(())
    }
}

impl std::fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record of one action within an execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionExecution {
    pub id: ActionExecutionId,
    /// Back-reference to the rule's action; the rule may since have changed.
    pub action_id: ActionId,
    pub status: ActionStatus,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl ActionExecution {
    #[must_use]
    pub fn pending(action_id: ActionId) -> Self {
        Self {
            id: ActionExecutionId::new(),
            action_id,
            status: ActionStatus::Pending,
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
        }
    }

    /// Mark as running.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] unless the record is pending.
    pub fn start(&mut self, at: Timestamp) -> Result<(), TransitionError> {
        self.status.transition(ActionStatus::Running)?;
        self.started_at = Some(at);
        Ok(())
    }

    /// Mark as completed with `result`.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] unless the record is running.
    pub fn complete(
        &mut self,
        at: Timestamp,
        result: serde_json::Value,
    ) -> Result<(), TransitionError> {
        self.status.transition(ActionStatus::Completed)?;
        self.completed_at = Some(at);
        self.result = Some(result);
        Ok(())
    }

    /// Mark as failed with `error`.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] unless the record is running.
    pub fn fail(&mut self, at: Timestamp, error: impl Into<String>) -> Result<(), TransitionError> {
        self.status.transition(ActionStatus::Failed)?;
        self.completed_at = Some(at);
        self.error = Some(error.into());
        Ok(())
    }

    /// Mark as skipped without running.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] unless the record is pending.
    pub fn skip(&mut self, reason: impl Into<String>) -> Result<(), TransitionError> {
        self.status.transition(ActionStatus::Skipped)?;
        self.error = Some(reason.into());
        Ok(())
    }
}

/// One run of a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationExecution {
    pub id: ExecutionId,
    pub rule_id: RuleId,
    pub triggered_at: Timestamp,
    pub completed_at: Option<Timestamp>,
    /// `completed_at - triggered_at` in milliseconds.
    pub duration_ms: Option<u64>,
    pub status: ExecutionStatus,
    pub context: PageContext,
    pub actions: Vec<ActionExecution>,
    pub error: Option<String>,
}

impl AutomationExecution {
    /// Create a pending execution with one pending record per rule action.
    #[must_use]
    pub fn new(rule: &AutomationRule, context: PageContext, at: Timestamp) -> Self {
        Self {
            id: ExecutionId::new(),
            rule_id: rule.id,
            triggered_at: at,
            completed_at: None,
            duration_ms: None,
            status: ExecutionStatus::Pending,
            context,
            actions: rule
                .actions
                .iter()
                .map(|action| ActionExecution::pending(action.id))
                .collect(),
            error: None,
        }
    }

    /// Mark as running.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] unless the execution is pending.
    pub fn start(&mut self) -> Result<(), TransitionError> {
        self.status.transition(ExecutionStatus::Running)
    }

    /// Mark as completed, stamping completion time and duration.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] unless the execution is running.
    pub fn complete(&mut self, at: Timestamp) -> Result<(), TransitionError> {
        self.status.transition(ExecutionStatus::Completed)?;
        self.finish(at);
        Ok(())
    }

    /// Mark as failed with `error`, stamping completion time and duration.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] unless the execution is running.
    pub fn fail(&mut self, at: Timestamp, error: impl Into<String>) -> Result<(), TransitionError> {
        self.status.transition(ExecutionStatus::Failed)?;
        self.error = Some(error.into());
        self.finish(at);
        Ok(())
    }

    /// Mark as cancelled. Nothing in the engine cancels executions yet;
    /// the transition exists for callers that add cancellation.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] once the execution is terminal.
    pub fn cancel(&mut self, at: Timestamp) -> Result<(), TransitionError> {
        self.status.transition(ExecutionStatus::Cancelled)?;
        self.finish(at);
        Ok(())
    }

    fn finish(&mut self, at: Timestamp) {
        self.completed_at = Some(at);
        self.duration_ms = Some(elapsed_ms(self.triggered_at, at));
    }

    /// Records in a given status.
    pub fn actions_with_status(
        &self,
        status: ActionStatus,
    ) -> impl Iterator<Item = &ActionExecution> {
        self.actions
            .iter()
            .filter(move |record| record.status == status)
    }
}
