//! Condition evaluator — decides whether a triggered rule may run.

use std::sync::Arc;

use pagerule_domain::context::PageContext;
use pagerule_domain::error::PageRuleError;
use pagerule_domain::rule::{Condition, ConditionKind};

use crate::ports::Environment;

/// Evaluates rule conditions against a page context.
///
/// Conditions are a conjunction evaluated in order; the first one that
/// does not hold stops evaluation.
pub struct ConditionEvaluator<E> {
    environment: Arc<E>,
}

impl<E: Environment> ConditionEvaluator<E> {
    pub fn new(environment: Arc<E>) -> Self {
        Self { environment }
    }

    /// `true` when every condition holds; an empty list always holds.
    ///
    /// # Errors
    ///
    /// Returns a collaborator error when an element probe fails.
    pub async fn evaluate(
        &self,
        conditions: &[Condition],
        context: &PageContext,
    ) -> Result<bool, PageRuleError> {
        for condition in conditions {
            if !self.evaluate_one(condition, context).await? {
                tracing::trace!(%condition, "condition not met");
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn evaluate_one(
        &self,
        condition: &Condition,
        context: &PageContext,
    ) -> Result<bool, PageRuleError> {
        match condition.kind {
            ConditionKind::Url => Ok(condition.compare(Some(&context.url))),
            ConditionKind::Domain => Ok(condition.compare(context.domain().as_deref())),
            ConditionKind::PageType => Ok(condition.compare(context.page_type.as_deref())),
            // presence of the selector in `value`; the operator is not consulted
            ConditionKind::Element => {
                if condition.value.trim().is_empty() {
                    return Ok(false);
                }
                self.environment
                    .element_exists(condition.value.clone())
                    .await
            }
            ConditionKind::Unknown => Ok(false),
        }
    }
}
