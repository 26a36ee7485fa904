//! Execution tracker — runs a rule's actions in order and keeps every
//! execution queryable.
//!
//! Each execution is owned by the task running it; the shared log only
//! ever receives copies, so no lock is held across an action.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use pagerule_domain::context::PageContext;
use pagerule_domain::error::{ActionFailure, NotFoundError, PageRuleError, error_chain};
use pagerule_domain::execution::AutomationExecution;
use pagerule_domain::id::{ExecutionId, RuleId};
use pagerule_domain::rule::AutomationRule;
use pagerule_domain::time::now;

use crate::action_executor::ActionExecutor;
use crate::event_bus::ExecutionBus;
use crate::ports::{AiProcessor, Environment, Notifier, RuleStorage};
use crate::rule_store::RuleStore;

/// In-memory execution history, in trigger order.
#[derive(Default)]
struct ExecutionLog {
    by_id: HashMap<ExecutionId, AutomationExecution>,
    order: Vec<ExecutionId>,
}

impl ExecutionLog {
    fn upsert(&mut self, execution: &AutomationExecution) {
        if self
            .by_id
            .insert(execution.id, execution.clone())
            .is_none()
        {
            self.order.push(execution.id);
        }
    }

    fn ordered(&self) -> impl DoubleEndedIterator<Item = &AutomationExecution> {
        self.order.iter().filter_map(|id| self.by_id.get(id))
    }
}

/// Runs executions and answers queries about them.
pub struct ExecutionTracker<S, E, A, N> {
    rules: Arc<RuleStore<S>>,
    executor: ActionExecutor<S, E, A, N>,
    log: Mutex<ExecutionLog>,
    bus: ExecutionBus,
}

impl<S, E, A, N> ExecutionTracker<S, E, A, N>
where
    S: RuleStorage,
    E: Environment,
    A: AiProcessor,
    N: Notifier,
{
    pub fn new(
        rules: Arc<RuleStore<S>>,
        executor: ActionExecutor<S, E, A, N>,
        bus: ExecutionBus,
    ) -> Self {
        Self {
            rules,
            executor,
            log: Mutex::new(ExecutionLog::default()),
            bus,
        }
    }

    /// Execute the rule with `rule_id` against `context`.
    ///
    /// Returns the terminal execution. With `stop_on_error` the first
    /// failing action aborts the run and its error is returned instead; the
    /// failed execution stays queryable.
    ///
    /// # Errors
    ///
    /// Returns [`PageRuleError::NotFound`] for an unknown rule,
    /// [`PageRuleError::Inactive`] for a disabled one, or
    /// [`PageRuleError::ActionFailure`] when a `stop_on_error` rule aborts.
    #[tracing::instrument(skip(self, context), fields(url = %context.url))]
    pub async fn execute_rule(
        &self,
        rule_id: RuleId,
        context: PageContext,
    ) -> Result<AutomationExecution, PageRuleError> {
        let rule = self.rules.get(rule_id).await.ok_or_else(|| NotFoundError {
            entity: "Rule",
            id: rule_id.to_string(),
        })?;
        if !rule.is_active {
            return Err(PageRuleError::Inactive { rule_id });
        }
        self.run(rule, context).await
    }

    async fn run(
        &self,
        rule: AutomationRule,
        context: PageContext,
    ) -> Result<AutomationExecution, PageRuleError> {
        let mut execution = AutomationExecution::new(&rule, context, now());
        self.record(&execution);
        execution.start()?;
        self.record(&execution);
        tracing::info!(
            execution_id = %execution.id,
            rule_id = %rule.id,
            rule_name = %rule.name,
            actions = execution.actions.len(),
            "execution started"
        );

        let mut failure = None;
        for index in 0..execution.actions.len() {
            let action_id = execution.actions[index].action_id;
            // a rule deleted mid-flight keeps running from the snapshot;
            // an action removed from a still-existing rule is skipped
            let action = match self.rules.get(rule.id).await {
                Some(current) => current.action(action_id).cloned(),
                None => rule.action(action_id).cloned(),
            };
            let Some(action) = action else {
                execution.actions[index].skip("action no longer exists on the rule")?;
                self.record(&execution);
                tracing::debug!(%action_id, "action removed, skipped");
                continue;
            };

            let result = self
                .executor
                .run(&action, &mut execution.actions[index], &execution.context)
                .await;
            self.record(&execution);

            if let Err(err) = result {
                tracing::warn!(
                    execution_id = %execution.id,
                    %action_id,
                    error = %error_chain(&err),
                    "action failed"
                );
                if rule.stop_on_error {
                    failure = Some(ActionFailure {
                        action_id,
                        source: Box::new(err),
                    });
                    break;
                }
            }
        }

        if let Some(failure) = failure {
            execution.fail(now(), error_chain(&failure))?;
            self.finish(&execution);
            return Err(failure.into());
        }

        execution.complete(now())?;
        self.finish(&execution);
        match self.rules.record_execution(rule.id, now()).await {
            Ok(_) => {}
            Err(PageRuleError::NotFound(_)) => {
                tracing::debug!(rule_id = %rule.id, "rule deleted before its execution finished");
            }
            Err(err) => {
                tracing::warn!(
                    rule_id = %rule.id,
                    error = %error_chain(&err),
                    "failed to persist execution count"
                );
            }
        }
        Ok(execution)
    }

    fn record(&self, execution: &AutomationExecution) {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .upsert(execution);
    }

    fn finish(&self, execution: &AutomationExecution) {
        self.record(execution);
        tracing::info!(
            execution_id = %execution.id,
            rule_id = %execution.rule_id,
            status = %execution.status,
            duration_ms = execution.duration_ms,
            "execution finished"
        );
        self.bus.publish(execution.clone());
    }

    #[must_use]
    pub fn get(&self, id: ExecutionId) -> Option<AutomationExecution> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .by_id
            .get(&id)
            .cloned()
    }

    /// Every execution, oldest first.
    #[must_use]
    pub fn list(&self) -> Vec<AutomationExecution> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .ordered()
            .cloned()
            .collect()
    }

    /// Executions of one rule, oldest first.
    #[must_use]
    pub fn for_rule(&self, rule_id: RuleId) -> Vec<AutomationExecution> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .ordered()
            .filter(|execution| execution.rule_id == rule_id)
            .cloned()
            .collect()
    }

    /// The `limit` most recent executions, newest first.
    #[must_use]
    pub fn recent(&self, limit: usize) -> Vec<AutomationExecution> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .ordered()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<AutomationExecution> {
        self.bus.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{EchoAi, FakePage, InMemoryStorage, SpyNotifier};
    use pagerule_domain::execution::{ActionStatus, ExecutionStatus};
    use pagerule_domain::rule::{Action, ActionKind, RuleDraft, RulePatch};
    use std::time::Duration;

    type Tracker = ExecutionTracker<InMemoryStorage, FakePage, EchoAi, SpyNotifier>;

    struct Harness {
        rules: Arc<RuleStore<InMemoryStorage>>,
        notifier: Arc<SpyNotifier>,
        tracker: Arc<Tracker>,
    }

    fn harness() -> Harness {
        let storage = Arc::new(InMemoryStorage::default());
        let page = Arc::new(FakePage::new("https://example.com").with_element("#ok", "ok", false));
        let notifier = Arc::new(SpyNotifier::default());
        let rules = Arc::new(RuleStore::new(Arc::clone(&storage)));
        let executor = ActionExecutor::new(storage, page, Arc::new(EchoAi), Arc::clone(&notifier));
        let tracker = Arc::new(ExecutionTracker::new(
            Arc::clone(&rules),
            executor,
            ExecutionBus::new(16),
        ));
        Harness {
            rules,
            notifier,
            tracker,
        }
    }

    fn notify(message: &str) -> Action {
        Action::new(ActionKind::Notify {
            message: message.to_string(),
        })
    }

    fn click(selector: &str) -> Action {
        Action::new(ActionKind::Click {
            selector: selector.to_string(),
        })
    }

    fn context() -> PageContext {
        PageContext::new("https://example.com", "Example", "")
    }

    fn rule(actions: Vec<Action>, stop_on_error: bool) -> RuleDraft {
        actions
            .into_iter()
            .fold(AutomationRule::builder().name("r"), RuleDraft::action)
            .stop_on_error(stop_on_error)
    }

    #[tokio::test]
    async fn should_run_actions_in_order_and_count_execution() {
        let h = harness();
        let r = h
            .rules
            .create(rule(vec![notify("one"), notify("two")], false))
            .await
            .unwrap();

        let exec = h.tracker.execute_rule(r.id, context()).await.unwrap();

        assert_eq!(exec.status, ExecutionStatus::Completed);
        assert!(exec.duration_ms.is_some());
        assert_eq!(exec.actions_with_status(ActionStatus::Completed).count(), 2);
        assert_eq!(
            *h.notifier.messages.lock().unwrap(),
            vec!["one".to_string(), "two".to_string()]
        );
        let stored = h.rules.get(r.id).await.unwrap();
        assert_eq!(stored.execution_count, 1);
        assert!(stored.last_executed.is_some());
    }

    #[tokio::test]
    async fn should_abort_remaining_actions_when_stop_on_error() {
        let h = harness();
        let r = h
            .rules
            .create(rule(vec![click("#ok"), click("#missing"), notify("never")], true))
            .await
            .unwrap();

        let err = h.tracker.execute_rule(r.id, context()).await.unwrap_err();
        assert!(matches!(err, PageRuleError::ActionFailure(_)));

        let exec = h.tracker.for_rule(r.id).pop().unwrap();
        assert_eq!(exec.status, ExecutionStatus::Failed);
        let statuses: Vec<ActionStatus> = exec.actions.iter().map(|a| a.status).collect();
        assert_eq!(
            statuses,
            vec![
                ActionStatus::Completed,
                ActionStatus::Failed,
                ActionStatus::Pending
            ]
        );
        assert!(h.notifier.messages.lock().unwrap().is_empty());
        assert_eq!(h.rules.get(r.id).await.unwrap().execution_count, 0);
    }

    #[tokio::test]
    async fn should_continue_after_failure_without_stop_on_error() {
        let h = harness();
        let r = h
            .rules
            .create(rule(vec![click("#missing"), notify("after")], false))
            .await
            .unwrap();

        let exec = h.tracker.execute_rule(r.id, context()).await.unwrap();

        assert_eq!(exec.status, ExecutionStatus::Completed);
        assert_eq!(exec.actions[0].status, ActionStatus::Failed);
        assert_eq!(exec.actions[1].status, ActionStatus::Completed);
    }

    #[tokio::test]
    async fn should_return_not_found_for_unknown_rule() {
        let h = harness();
        let err = h
            .tracker
            .execute_rule(RuleId::new(), context())
            .await
            .unwrap_err();
        assert!(matches!(err, PageRuleError::NotFound(_)));
        assert!(h.tracker.list().is_empty());
    }

    #[tokio::test]
    async fn should_refuse_inactive_rule() {
        let h = harness();
        let r = h
            .rules
            .create(rule(vec![notify("x")], false).active(false))
            .await
            .unwrap();
        let err = h.tracker.execute_rule(r.id, context()).await.unwrap_err();
        assert!(matches!(err, PageRuleError::Inactive { rule_id } if rule_id == r.id));
    }

    #[tokio::test(start_paused = true)]
    async fn should_skip_action_removed_mid_flight() {
        let h = harness();
        let wait = Action::new(ActionKind::Wait {
            duration_ms: Some(100),
        });
        let removed = notify("removed");
        let r = h
            .rules
            .create(rule(vec![wait.clone(), removed], false))
            .await
            .unwrap();

        let tracker = Arc::clone(&h.tracker);
        let handle = tokio::spawn(async move { tracker.execute_rule(r.id, context()).await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        h.rules
            .update(
                r.id,
                RulePatch {
                    actions: Some(vec![wait]),
                    ..RulePatch::default()
                },
            )
            .await
            .unwrap();

        let exec = handle.await.unwrap().unwrap();
        assert_eq!(exec.actions[0].status, ActionStatus::Completed);
        assert_eq!(exec.actions[1].status, ActionStatus::Skipped);
        assert!(h.notifier.messages.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn should_finish_from_snapshot_when_rule_deleted_mid_flight() {
        let h = harness();
        let r = h
            .rules
            .create(rule(
                vec![
                    Action::new(ActionKind::Wait {
                        duration_ms: Some(100),
                    }),
                    notify("still runs"),
                ],
                false,
            ))
            .await
            .unwrap();

        let tracker = Arc::clone(&h.tracker);
        let handle = tokio::spawn(async move { tracker.execute_rule(r.id, context()).await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        h.rules.delete(r.id).await.unwrap();

        let exec = handle.await.unwrap().unwrap();
        assert_eq!(exec.status, ExecutionStatus::Completed);
        assert_eq!(
            *h.notifier.messages.lock().unwrap(),
            vec!["still runs".to_string()]
        );
    }

    #[tokio::test]
    async fn should_publish_terminal_executions() {
        let h = harness();
        let mut rx = h.tracker.subscribe();
        let r = h.rules.create(rule(vec![notify("x")], false)).await.unwrap();

        let exec = h.tracker.execute_rule(r.id, context()).await.unwrap();

        let published = rx.recv().await.unwrap();
        assert_eq!(published.id, exec.id);
        assert_eq!(published.status, ExecutionStatus::Completed);
    }

    #[tokio::test]
    async fn should_query_executions_by_rule_and_recency() {
        let h = harness();
        let a = h.rules.create(rule(vec![notify("a")], false)).await.unwrap();
        let b = h.rules.create(rule(vec![notify("b")], false)).await.unwrap();

        let first = h.tracker.execute_rule(a.id, context()).await.unwrap();
        let second = h.tracker.execute_rule(b.id, context()).await.unwrap();
        let third = h.tracker.execute_rule(a.id, context()).await.unwrap();

        assert_eq!(h.tracker.list().len(), 3);
        assert_eq!(h.tracker.for_rule(a.id).len(), 2);
        let recent: Vec<ExecutionId> = h.tracker.recent(2).iter().map(|e| e.id).collect();
        assert_eq!(recent, vec![third.id, second.id]);
        assert_eq!(h.tracker.get(first.id).unwrap().rule_id, a.id);
    }
}
