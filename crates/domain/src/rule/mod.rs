//! Rule — trigger → conditions → actions automation units.
//!
//! An [`AutomationRule`] has one [`Trigger`] that makes it a candidate to
//! run, zero or more [`Condition`]s that must all hold, and one or more
//! [`Action`]s executed in order.

mod action;
mod condition;
mod trigger;

pub use action::{AiOperation, Action, ActionKind, DEFAULT_WAIT_MS, Sentiment};
pub use condition::{Condition, ConditionKind, Operator};
pub use trigger::{Schedule, Trigger};

use serde::{Deserialize, Serialize};

use crate::error::{PageRuleError, ValidationError};
use crate::id::{ActionId, RuleId};
use crate::time::Timestamp;

/// A named automation unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutomationRule {
    pub id: RuleId,
    pub name: String,
    pub trigger: Trigger,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    pub actions: Vec<Action>,
    #[serde(alias = "isActive")]
    pub is_active: bool,
    #[serde(default, alias = "stopOnError")]
    pub stop_on_error: bool,
    #[serde(alias = "createdAt")]
    pub created_at: Timestamp,
    #[serde(alias = "updatedAt")]
    pub updated_at: Timestamp,
    #[serde(default, alias = "executionCount")]
    pub execution_count: u64,
    #[serde(default, alias = "lastExecuted")]
    pub last_executed: Option<Timestamp>,
}

impl AutomationRule {
    /// Start describing a new rule.
    #[must_use]
    pub fn builder() -> RuleDraft {
        RuleDraft::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`PageRuleError::Validation`] when:
    /// - `name` is blank ([`ValidationError::EmptyName`])
    /// - `actions` is empty ([`ValidationError::NoActions`])
    pub fn validate(&self) -> Result<(), PageRuleError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if self.actions.is_empty() {
            return Err(ValidationError::NoActions.into());
        }
        Ok(())
    }

    /// Look up one of this rule's actions.
    #[must_use]
    pub fn action(&self, id: ActionId) -> Option<&Action> {
        self.actions.iter().find(|action| action.id == id)
    }

    /// Record a completed execution.
    pub fn record_execution(&mut self, at: Timestamp) {
        self.execution_count += 1;
        self.last_executed = Some(at);
    }
}

/// The caller-supplied part of a rule; the store fills in the rest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDraft {
    pub name: String,
    pub trigger: Trigger,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    pub actions: Vec<Action>,
    #[serde(default = "default_true", alias = "isActive")]
    pub is_active: bool,
    #[serde(default, alias = "stopOnError")]
    pub stop_on_error: bool,
}

fn default_true() -> bool {
    true
}

impl Default for RuleDraft {
    fn default() -> Self {
        Self {
            name: String::new(),
            trigger: Trigger::PageLoad,
            conditions: Vec::new(),
            actions: Vec::new(),
            is_active: true,
            stop_on_error: false,
        }
    }
}

impl RuleDraft {
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn trigger(mut self, trigger: Trigger) -> Self {
        self.trigger = trigger;
        self
    }

    #[must_use]
    pub fn condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    #[must_use]
    pub fn action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    #[must_use]
    pub fn active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }

    #[must_use]
    pub fn stop_on_error(mut self, stop_on_error: bool) -> Self {
        self.stop_on_error = stop_on_error;
        self
    }

    /// Turn the draft into a rule with a fresh id created at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`PageRuleError::Validation`] if the resulting rule breaks
    /// an invariant.
    pub fn into_rule(self, now: Timestamp) -> Result<AutomationRule, PageRuleError> {
        let rule = AutomationRule {
            id: RuleId::new(),
            name: self.name,
            trigger: self.trigger,
            conditions: self.conditions,
            actions: self.actions,
            is_active: self.is_active,
            stop_on_error: self.stop_on_error,
            created_at: now,
            updated_at: now,
            execution_count: 0,
            last_executed: None,
        };
        rule.validate()?;
        Ok(rule)
    }
}

/// A partial update. Absent fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulePatch {
    pub name: Option<String>,
    pub trigger: Option<Trigger>,
    pub conditions: Option<Vec<Condition>>,
    pub actions: Option<Vec<Action>>,
    #[serde(alias = "isActive")]
    pub is_active: Option<bool>,
    #[serde(alias = "stopOnError")]
    pub stop_on_error: Option<bool>,
}

impl RulePatch {
    /// Merge this patch into `rule`, bumping `updated_at` to `now` (never
    /// earlier than `created_at`).
    ///
    /// Returns `true` when the trigger changed or `is_active` toggled, i.e.
    /// when the rule's watchers must be re-registered.
    ///
    /// # Errors
    ///
    /// Returns [`PageRuleError::Validation`] if the merged rule breaks an
    /// invariant; `rule` is left untouched in that case.
    pub fn apply(self, rule: &mut AutomationRule, now: Timestamp) -> Result<bool, PageRuleError> {
        let mut merged = rule.clone();
        if let Some(name) = self.name {
            merged.name = name;
        }
        if let Some(trigger) = self.trigger {
            merged.trigger = trigger;
        }
        if let Some(conditions) = self.conditions {
            merged.conditions = conditions;
        }
        if let Some(actions) = self.actions {
            merged.actions = actions;
        }
        if let Some(is_active) = self.is_active {
            merged.is_active = is_active;
        }
        if let Some(stop_on_error) = self.stop_on_error {
            merged.stop_on_error = stop_on_error;
        }
        merged.validate()?;
        merged.updated_at = now.max(merged.created_at);

        let rearm = merged.trigger != rule.trigger || merged.is_active != rule.is_active;
        *rule = merged;
        Ok(rearm)
    }
}
