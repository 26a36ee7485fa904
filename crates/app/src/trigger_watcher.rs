//! Trigger watcher — turns page activity into trigger checks.
//!
//! Two tiers of watchers exist:
//! - global ones installed at engine start and shared by every rule
//!   (page load, debounced navigation, debounced content changes)
//! - per-rule ones for triggers that need their own source
//!   (`time_based` pollers and `user_action` listeners)
//!
//! Every watcher is a spawned task; its [`WatchHandle`] aborts it on drop,
//! which also drops the task's subscription.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::NaiveDateTime;
use tokio::task::AbortHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

use pagerule_domain::context::PageContext;
use pagerule_domain::error::PageRuleError;
use pagerule_domain::id::RuleId;
use pagerule_domain::rule::{AutomationRule, Trigger};

use crate::config::EngineConfig;
use crate::ports::Environment;

/// What caused a trigger check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerCause {
    PageLoad,
    Navigation,
    ContentChange,
    Schedule,
    UserAction,
}

impl TriggerCause {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PageLoad => "page_load",
            Self::Navigation => "navigation",
            Self::ContentChange => "content_change",
            Self::Schedule => "schedule",
            Self::UserAction => "user_action",
        }
    }
}

/// Receives trigger firings from the watchers.
pub trait TriggerSink: Clone + Send + Sync + 'static {
    /// A global trigger fired: every active rule must be checked.
    fn page_changed(&self, cause: TriggerCause) -> impl Future<Output = ()> + Send;

    /// A per-rule trigger fired for `rule_id`.
    fn rule_triggered(
        &self,
        rule_id: RuleId,
        cause: TriggerCause,
    ) -> impl Future<Output = ()> + Send;
}

/// Aborts its watcher task when dropped.
#[derive(Debug)]
pub struct WatchHandle(AbortHandle);

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn spawn_watch(task: impl Future<Output = ()> + Send + 'static) -> WatchHandle {
    WatchHandle(tokio::spawn(task).abort_handle())
}

/// Owns every watcher task.
pub struct TriggerWatcher {
    content_debounce: Duration,
    navigation_debounce: Duration,
    schedule_poll_interval: Duration,
    global: Mutex<Vec<WatchHandle>>,
    per_rule: Mutex<HashMap<RuleId, WatchHandle>>,
}

impl TriggerWatcher {
    #[must_use]
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            content_debounce: config.content_debounce,
            navigation_debounce: config.navigation_debounce,
            schedule_poll_interval: config.schedule_poll_interval.max(Duration::from_millis(1)),
            global: Mutex::new(Vec::new()),
            per_rule: Mutex::new(HashMap::new()),
        }
    }

    /// Install the page-level watchers. Any previously installed ones are
    /// replaced.
    pub fn install_global<E, K>(&self, environment: &Arc<E>, sink: &K)
    where
        E: Environment + 'static,
        K: TriggerSink,
    {
        // subscribe before spawning so nothing between start and the first
        // poll is missed
        let navigations = BroadcastStream::new(environment.navigations());
        let content = BroadcastStream::new(environment.content_changes());

        let page_load = {
            let environment = Arc::clone(environment);
            let sink = sink.clone();
            spawn_watch(async move {
                environment.ready().await;
                sink.page_changed(TriggerCause::PageLoad).await;
            })
        };
        let handles = vec![
            page_load,
            spawn_watch(debounced(
                navigations,
                self.navigation_debounce,
                sink.clone(),
                TriggerCause::Navigation,
            )),
            spawn_watch(debounced(
                content,
                self.content_debounce,
                sink.clone(),
                TriggerCause::ContentChange,
            )),
        ];
        *self.global.lock().unwrap_or_else(PoisonError::into_inner) = handles;
    }

    /// Install the dedicated watcher of `rule`, replacing any previous one.
    /// Rules whose trigger is fully covered by the global watchers get none.
    pub fn register_rule<E, K>(&self, rule: &AutomationRule, environment: &Arc<E>, sink: &K)
    where
        E: Environment + 'static,
        K: TriggerSink,
    {
        let rule_id = rule.id;
        let sink = sink.clone();
        let handle = match &rule.trigger {
            Trigger::TimeBased { .. } => {
                let period = self.schedule_poll_interval;
                spawn_watch(async move {
                    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                    loop {
                        ticker.tick().await;
                        sink.rule_triggered(rule_id, TriggerCause::Schedule).await;
                    }
                })
            }
            Trigger::UserAction { event, selector } => {
                let mut events =
                    BroadcastStream::new(environment.user_events(event, selector.as_deref()));
                spawn_watch(async move {
                    while let Some(item) = events.next().await {
                        if item.is_ok() {
                            sink.rule_triggered(rule_id, TriggerCause::UserAction)
                                .await;
                        }
                    }
                })
            }
            Trigger::PageLoad | Trigger::UrlChange { .. } | Trigger::ElementAppears { .. } => {
                self.unregister_rule(rule_id);
                return;
            }
        };
        tracing::debug!(%rule_id, trigger = %rule.trigger, "rule watcher registered");
        self.per_rule
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(rule_id, handle);
    }

    /// Tear down the dedicated watcher of `rule_id`, if any.
    pub fn unregister_rule(&self, rule_id: RuleId) -> bool {
        self.per_rule
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&rule_id)
            .is_some()
    }

    /// Number of rules with a dedicated watcher.
    #[must_use]
    pub fn registered_rules(&self) -> usize {
        self.per_rule
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Tear down every watcher.
    pub fn shutdown(&self) {
        self.global
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.per_rule
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// Fire `cause` once per burst: after the first notification, wait until
/// `window` passes without another one.
async fn debounced<T, K>(
    mut notifications: BroadcastStream<T>,
    window: Duration,
    sink: K,
    cause: TriggerCause,
) where
    T: Clone + Send + 'static,
    K: TriggerSink,
{
    while next_burst(&mut notifications, window).await {
        sink.page_changed(cause).await;
    }
}

async fn next_burst<T>(notifications: &mut BroadcastStream<T>, window: Duration) -> bool
where
    T: Clone + Send + 'static,
{
    // a lagged receiver still signals activity
    if notifications.next().await.is_none() {
        return false;
    }
    loop {
        match tokio::time::timeout(window, notifications.next()).await {
            Ok(Some(_)) => {}
            Ok(None) | Err(_) => return true,
        }
    }
}

/// Whether `trigger` holds for `context` during a trigger check.
///
/// `user_action` triggers are pushed by their listener and never hold here.
///
/// # Errors
///
/// Returns a collaborator error when an element probe fails.
pub async fn trigger_holds<E: Environment>(
    trigger: &Trigger,
    context: &PageContext,
    environment: &E,
    local_now: NaiveDateTime,
) -> Result<bool, PageRuleError> {
    match trigger {
        Trigger::PageLoad => Ok(true),
        Trigger::UrlChange { .. } => Ok(trigger.matches_url(&context.url)),
        Trigger::ElementAppears { selector } => {
            environment.element_exists(selector.clone()).await
        }
        Trigger::TimeBased { schedule } => Ok(schedule.is_active_at(local_now)),
        Trigger::UserAction { .. } => Ok(false),
    }
}
