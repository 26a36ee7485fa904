//! Automation engine — the facade wiring store, watchers, evaluator,
//! executor and tracker together.
//!
//! The engine is a cheap handle (`Clone` shares state), so watcher tasks
//! and spawned executions can each hold one.

use std::future::Future;
use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{Local, NaiveDateTime};
use tokio::sync::broadcast;
use tokio_util::task::TaskTracker;

use pagerule_domain::context::PageContext;
use pagerule_domain::error::{PageRuleError, error_chain};
use pagerule_domain::execution::AutomationExecution;
use pagerule_domain::id::{ExecutionId, RuleId};
use pagerule_domain::rule::{AutomationRule, RuleDraft, RulePatch, Trigger};
use pagerule_domain::stats::EngineStats;

use crate::action_executor::ActionExecutor;
use crate::condition_evaluator::ConditionEvaluator;
use crate::config::EngineConfig;
use crate::event_bus::ExecutionBus;
use crate::execution_tracker::ExecutionTracker;
use crate::ports::{AiProcessor, Environment, Notifier, RuleStorage};
use crate::rule_store::{RuleStore, RuleUpdate};
use crate::trigger_watcher::{TriggerCause, TriggerSink, TriggerWatcher, trigger_holds};

struct Inner<S, E, A, N> {
    config: EngineConfig,
    rules: Arc<RuleStore<S>>,
    environment: Arc<E>,
    evaluator: ConditionEvaluator<E>,
    tracker: ExecutionTracker<S, E, A, N>,
    watcher: TriggerWatcher,
    tasks: TaskTracker,
    idle_gate: tokio::sync::Mutex<()>,
    running: AtomicBool,
}

/// Rule-based page automation engine.
pub struct AutomationEngine<S, E, A, N> {
    inner: Arc<Inner<S, E, A, N>>,
}

impl<S, E, A, N> Clone for AutomationEngine<S, E, A, N> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S, E, A, N> AutomationEngine<S, E, A, N>
where
    S: RuleStorage + 'static,
    E: Environment + 'static,
    A: AiProcessor + 'static,
    N: Notifier + 'static,
{
    /// Build a stopped engine over the given collaborators.
    pub fn new(
        storage: Arc<S>,
        environment: Arc<E>,
        ai: Arc<A>,
        notifier: Arc<N>,
        config: EngineConfig,
    ) -> Self {
        let rules = Arc::new(RuleStore::new(Arc::clone(&storage)));
        let executor = ActionExecutor::new(storage, Arc::clone(&environment), ai, notifier);
        let tracker = ExecutionTracker::new(
            Arc::clone(&rules),
            executor,
            ExecutionBus::new(config.execution_channel_capacity),
        );
        Self {
            inner: Arc::new(Inner {
                watcher: TriggerWatcher::new(&config),
                evaluator: ConditionEvaluator::new(Arc::clone(&environment)),
                config,
                rules,
                environment,
                tracker,
                tasks: TaskTracker::new(),
                idle_gate: tokio::sync::Mutex::new(()),
                running: AtomicBool::new(false),
            }),
        }
    }

    /// Load persisted rules, install the page-level watchers and the
    /// dedicated watcher of every active rule. Starting a running engine
    /// does nothing.
    ///
    /// # Errors
    ///
    /// Returns a storage error when the rules cannot be loaded; the engine
    /// stays stopped.
    #[tracing::instrument(skip(self))]
    pub async fn start(&self) -> Result<(), PageRuleError> {
        if self.is_running() {
            tracing::debug!("engine already running");
            return Ok(());
        }
        let loaded = self.inner.rules.load().await?;
        self.inner.running.store(true, Ordering::SeqCst);
        self.inner
            .watcher
            .install_global(&self.inner.environment, &self.sink());
        for rule in self.inner.rules.active().await {
            self.arm(&rule);
        }
        tracing::info!(
            rules = loaded,
            watched = self.inner.watcher.registered_rules(),
            "engine started"
        );
        Ok(())
    }

    /// Stop reacting to triggers and tear down every watcher. Executions
    /// already running finish undisturbed.
    pub fn stop(&self) {
        if self.inner.running.swap(false, Ordering::SeqCst) {
            self.inner.watcher.shutdown();
            tracing::info!("engine stopped");
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    fn sink(&self) -> EngineSink<S, E, A, N> {
        EngineSink {
            inner: Arc::downgrade(&self.inner),
        }
    }

    fn arm(&self, rule: &AutomationRule) {
        if self.is_running() && rule.is_active && rule.trigger.has_dedicated_watcher() {
            self.inner
                .watcher
                .register_rule(rule, &self.inner.environment, &self.sink());
        }
    }

    /// Create and persist a rule, registering its watcher if needed.
    ///
    /// # Errors
    ///
    /// Returns [`PageRuleError::Validation`] if the draft is invalid, or a
    /// storage error.
    pub async fn create_rule(&self, draft: RuleDraft) -> Result<AutomationRule, PageRuleError> {
        let rule = self.inner.rules.create(draft).await?;
        self.arm(&rule);
        Ok(rule)
    }

    /// Create every draft in order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns the first draft's error; rules created before it are kept.
    #[tracing::instrument(skip(self, drafts), fields(count = drafts.len()))]
    pub async fn import_rules(
        &self,
        drafts: Vec<RuleDraft>,
    ) -> Result<Vec<AutomationRule>, PageRuleError> {
        let mut created = Vec::with_capacity(drafts.len());
        for draft in drafts {
            created.push(self.create_rule(draft).await?);
        }
        Ok(created)
    }

    /// Merge `patch` into a rule, re-registering its watcher when the
    /// trigger or activity changed.
    ///
    /// # Errors
    ///
    /// Returns [`PageRuleError::NotFound`] for an unknown id,
    /// [`PageRuleError::Validation`] for an invalid result, or a storage
    /// error.
    pub async fn update_rule(
        &self,
        id: RuleId,
        patch: RulePatch,
    ) -> Result<AutomationRule, PageRuleError> {
        let RuleUpdate { rule, rearm } = self.inner.rules.update(id, patch).await?;
        if rearm {
            self.inner.watcher.unregister_rule(id);
            self.arm(&rule);
        }
        Ok(rule)
    }

    /// Delete a rule and tear down its watcher.
    ///
    /// # Errors
    ///
    /// Returns [`PageRuleError::NotFound`] for an unknown id, or a storage
    /// error.
    pub async fn delete_rule(&self, id: RuleId) -> Result<(), PageRuleError> {
        self.inner.rules.delete(id).await?;
        self.inner.watcher.unregister_rule(id);
        Ok(())
    }

    pub async fn get_rule(&self, id: RuleId) -> Option<AutomationRule> {
        self.inner.rules.get(id).await
    }

    pub async fn list_rules(&self) -> Vec<AutomationRule> {
        self.inner.rules.list().await
    }

    /// Run a rule now, regardless of its trigger and conditions, and wait
    /// for the execution to finish.
    ///
    /// # Errors
    ///
    /// See [`ExecutionTracker::execute_rule`].
    pub async fn execute_rule(
        &self,
        rule_id: RuleId,
        context: PageContext,
    ) -> Result<AutomationExecution, PageRuleError> {
        self.inner.tracker.execute_rule(rule_id, context).await
    }

    /// Check every active rule against `context` and spawn an execution
    /// for each whose trigger and conditions hold. Returns the fired rules.
    ///
    /// A rule whose evaluation fails is logged and skipped. A stopped
    /// engine fires nothing.
    pub async fn check_triggers(&self, context: PageContext) -> Vec<RuleId> {
        if !self.is_running() {
            return Vec::new();
        }
        let local_now = Local::now().naive_local();
        let mut fired = Vec::new();
        for rule in self.inner.rules.active().await {
            if rule.trigger.is_push_triggered() {
                continue;
            }
            match self.rule_matches(&rule, &context, local_now).await {
                Ok(true) => {
                    self.dispatch(rule.id, context.clone());
                    fired.push(rule.id);
                }
                Ok(false) => {}
                Err(err) => {
                    tracing::warn!(
                        rule_id = %rule.id,
                        error = %error_chain(&err),
                        "trigger evaluation failed"
                    );
                }
            }
        }
        fired
    }

    async fn rule_matches(
        &self,
        rule: &AutomationRule,
        context: &PageContext,
        local_now: NaiveDateTime,
    ) -> Result<bool, PageRuleError> {
        let environment = self.inner.environment.as_ref();
        if !trigger_holds(&rule.trigger, context, environment, local_now).await? {
            return Ok(false);
        }
        self.inner
            .evaluator
            .evaluate(&rule.conditions, context)
            .await
    }

    fn dispatch(&self, rule_id: RuleId, context: PageContext) {
        let engine = self.clone();
        self.inner.tasks.spawn(async move {
            if let Err(err) = engine.inner.tracker.execute_rule(rule_id, context).await {
                tracing::warn!(%rule_id, error = %error_chain(&err), "triggered execution failed");
            }
        });
    }

    /// Wait until every execution spawned by a trigger has finished.
    /// Concurrent callers take turns.
    pub async fn wait_for_idle(&self) {
        let _turn = self.inner.idle_gate.lock().await;
        self.inner.tasks.close();
        self.inner.tasks.wait().await;
        self.inner.tasks.reopen();
    }

    #[must_use]
    pub fn get_execution(&self, id: ExecutionId) -> Option<AutomationExecution> {
        self.inner.tracker.get(id)
    }

    /// Every execution, oldest first.
    #[must_use]
    pub fn list_executions(&self) -> Vec<AutomationExecution> {
        self.inner.tracker.list()
    }

    #[must_use]
    pub fn executions_for_rule(&self, rule_id: RuleId) -> Vec<AutomationExecution> {
        self.inner.tracker.for_rule(rule_id)
    }

    /// The `limit` most recent executions, newest first.
    #[must_use]
    pub fn recent_executions(&self, limit: usize) -> Vec<AutomationExecution> {
        self.inner.tracker.recent(limit)
    }

    /// Receive every execution that reaches a terminal state from now on.
    #[must_use]
    pub fn subscribe_executions(&self) -> broadcast::Receiver<AutomationExecution> {
        self.inner.tracker.subscribe()
    }

    pub async fn stats(&self) -> EngineStats {
        let rules = self.inner.rules.list().await;
        let executions = self.inner.tracker.list();
        EngineStats::compute(
            &rules,
            &executions,
            self.inner.config.time_saved_per_execution_secs,
        )
    }

    async fn on_page_changed(&self, cause: TriggerCause) {
        if !self.is_running() {
            return;
        }
        match self.inner.environment.snapshot().await {
            Ok(context) => {
                let fired = self.check_triggers(context).await;
                tracing::debug!(cause = cause.as_str(), fired = fired.len(), "triggers checked");
            }
            Err(err) => {
                tracing::warn!(
                    cause = cause.as_str(),
                    error = %error_chain(&err),
                    "page snapshot failed"
                );
            }
        }
    }

    async fn on_rule_triggered(&self, rule_id: RuleId, cause: TriggerCause) {
        if !self.is_running() {
            return;
        }
        let Some(rule) = self.inner.rules.get(rule_id).await else {
            return;
        };
        if !rule.is_active {
            return;
        }
        if let Trigger::TimeBased { schedule } = &rule.trigger {
            if !schedule.is_active_at(Local::now().naive_local()) {
                return;
            }
        }
        let result = match self.inner.environment.snapshot().await {
            Ok(context) => self
                .inner
                .evaluator
                .evaluate(&rule.conditions, &context)
                .await
                .map(|holds| holds.then_some(context)),
            Err(err) => Err(err),
        };
        match result {
            Ok(Some(context)) => {
                tracing::debug!(%rule_id, cause = cause.as_str(), "rule triggered");
                self.dispatch(rule_id, context);
            }
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(
                    %rule_id,
                    cause = cause.as_str(),
                    error = %error_chain(&err),
                    "trigger evaluation failed"
                );
            }
        }
    }
}

/// The engine as seen by its watcher tasks. Holds no strong reference, so
/// dropping the last engine handle drops the watchers and aborts them.
struct EngineSink<S, E, A, N> {
    inner: Weak<Inner<S, E, A, N>>,
}

impl<S, E, A, N> Clone for EngineSink<S, E, A, N> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<S, E, A, N> EngineSink<S, E, A, N> {
    fn engine(&self) -> Option<AutomationEngine<S, E, A, N>> {
        self.inner.upgrade().map(|inner| AutomationEngine { inner })
    }
}

impl<S, E, A, N> TriggerSink for EngineSink<S, E, A, N>
where
    S: RuleStorage + 'static,
    E: Environment + 'static,
    A: AiProcessor + 'static,
    N: Notifier + 'static,
{
    fn page_changed(&self, cause: TriggerCause) -> impl Future<Output = ()> + Send {
        let engine = self.engine();
        async move {
            if let Some(engine) = engine {
                engine.on_page_changed(cause).await;
            }
        }
    }

    fn rule_triggered(
        &self,
        rule_id: RuleId,
        cause: TriggerCause,
    ) -> impl Future<Output = ()> + Send {
        let engine = self.engine();
        async move {
            if let Some(engine) = engine {
                engine.on_rule_triggered(rule_id, cause).await;
            }
        }
    }
}
