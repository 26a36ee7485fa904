//! Action executor — runs one action against the collaborators.
//!
//! Dispatch is a closed match over [`ActionKind`]; adding an action type
//! means adding an arm here.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use pagerule_domain::context::PageContext;
use pagerule_domain::error::{PageRuleError, error_chain};
use pagerule_domain::execution::ActionExecution;
use pagerule_domain::rule::{AiOperation, Action, ActionKind, DEFAULT_WAIT_MS};
use pagerule_domain::time::now;

use crate::ports::{AiProcessor, Delivery, Environment, NavigationTarget, Notifier, RuleStorage};

/// Events emitted after a fill so page logic observes the new value.
const FILL_EVENTS: [&str; 3] = ["input", "change", "blur"];

/// Prefix of the keys `save` actions store pages under.
pub const SAVED_PAGE_KEY_PREFIX: &str = "saved_page_";

/// Runs actions and keeps their [`ActionExecution`] records current.
pub struct ActionExecutor<S, E, A, N> {
    storage: Arc<S>,
    environment: Arc<E>,
    ai: Arc<A>,
    notifier: Arc<N>,
}

impl<S, E, A, N> ActionExecutor<S, E, A, N>
where
    S: RuleStorage,
    E: Environment,
    A: AiProcessor,
    N: Notifier,
{
    pub fn new(storage: Arc<S>, environment: Arc<E>, ai: Arc<A>, notifier: Arc<N>) -> Self {
        Self {
            storage,
            environment,
            ai,
            notifier,
        }
    }

    /// Run `action`, moving `record` through running to completed or
    /// failed. On success the action's `delay_ms` is slept before
    /// returning.
    ///
    /// # Errors
    ///
    /// Returns the action's error after recording it on `record`, or
    /// [`PageRuleError::InvalidTransition`] if `record` is not pending.
    pub async fn run(
        &self,
        action: &Action,
        record: &mut ActionExecution,
        context: &PageContext,
    ) -> Result<(), PageRuleError> {
        record.start(now())?;
        tracing::debug!(action_id = %action.id, %action, "running action");

        match self.execute(action, context).await {
            Ok(result) => {
                record.complete(now(), result)?;
                if let Some(delay) = action.delay_ms.filter(|delay| *delay > 0) {
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
                Ok(())
            }
            Err(err) => {
                record.fail(now(), error_chain(&err))?;
                Err(err)
            }
        }
    }

    /// Perform `action` and return its result value.
    ///
    /// # Errors
    ///
    /// Returns [`PageRuleError::ElementNotFound`] or
    /// [`PageRuleError::NotEditable`] when the target element is unusable,
    /// [`PageRuleError::Validation`] for an unknown AI operation, or the
    /// collaborator's error.
    pub async fn execute(
        &self,
        action: &Action,
        context: &PageContext,
    ) -> Result<serde_json::Value, PageRuleError> {
        match &action.kind {
            ActionKind::Click { selector } => self.click(selector).await,
            ActionKind::Fill { selector, value } => self.fill(selector, value).await,
            ActionKind::Navigate { url, new_tab } => {
                let target = if *new_tab {
                    NavigationTarget::NewTab
                } else {
                    NavigationTarget::CurrentFrame
                };
                self.environment.navigate(url.clone(), target).await?;
                Ok(json!({ "url": url, "new_tab": new_tab }))
            }
            ActionKind::Extract { selector } => {
                let texts: Vec<String> = self
                    .environment
                    .query_all(selector.clone())
                    .await?
                    .into_iter()
                    .map(|element| element.text.trim().to_string())
                    .collect();
                Ok(json!(texts))
            }
            ActionKind::AiProcess { operation } => self.ai_process(operation, context).await,
            ActionKind::Notify { message } => {
                let delivery = self.notifier.notify(message.clone()).await;
                if delivery != Delivery::Delivered {
                    tracing::info!(
                        reason = delivery.as_str(),
                        %message,
                        "notification fallback"
                    );
                }
                Ok(json!({ "delivered": delivery == Delivery::Delivered }))
            }
            ActionKind::Save { tags } => {
                let key = format!("{SAVED_PAGE_KEY_PREFIX}{}", uuid::Uuid::new_v4());
                let page = json!({
                    "url": context.url,
                    "title": context.title,
                    "content": context.content,
                    "timestamp": now(),
                    "tags": tags,
                });
                self.storage.save_blob(key.clone(), page).await?;
                Ok(json!({ "key": key }))
            }
            ActionKind::Wait { duration_ms } => {
                let waited = duration_ms.unwrap_or(DEFAULT_WAIT_MS);
                tokio::time::sleep(Duration::from_millis(waited)).await;
                Ok(json!({ "waited_ms": waited }))
            }
        }
    }

    async fn click(&self, selector: &str) -> Result<serde_json::Value, PageRuleError> {
        if self.environment.query(selector.to_string()).await?.is_none() {
            return Err(PageRuleError::ElementNotFound {
                selector: selector.to_string(),
            });
        }
        self.environment
            .scroll_into_view(selector.to_string())
            .await?;
        self.environment.click(selector.to_string()).await?;
        Ok(json!({ "clicked": selector }))
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<serde_json::Value, PageRuleError> {
        let element = self
            .environment
            .query(selector.to_string())
            .await?
            .ok_or_else(|| PageRuleError::ElementNotFound {
                selector: selector.to_string(),
            })?;
        if !element.editable {
            return Err(PageRuleError::NotEditable {
                selector: selector.to_string(),
            });
        }
        self.environment
            .set_value(selector.to_string(), value.to_string())
            .await?;
        for event in FILL_EVENTS {
            self.environment
                .dispatch(selector.to_string(), event.to_string())
                .await?;
        }
        Ok(json!({ "filled": selector }))
    }

    async fn ai_process(
        &self,
        operation: &str,
        context: &PageContext,
    ) -> Result<serde_json::Value, PageRuleError> {
        let operation: AiOperation = operation.parse()?;
        let text = context.content.clone();
        let output = match operation {
            AiOperation::Summarize => json!(self.ai.summarize(text).await?),
            AiOperation::ExtractEntities => json!(self.ai.extract_entities(text).await?),
            AiOperation::AnalyzeSentiment => json!(self.ai.analyze_sentiment(text).await?),
        };
        Ok(json!({ "operation": operation.as_str(), "output": output }))
    }
}
