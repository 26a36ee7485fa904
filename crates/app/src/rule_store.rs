//! Rule store — CRUD over the rule list with write-through persistence.
//!
//! The in-memory list only changes after storage accepted the new list, so
//! a failed save leaves both sides as they were.

use std::sync::Arc;

use tokio::sync::RwLock;

use pagerule_domain::error::{NotFoundError, PageRuleError};
use pagerule_domain::id::RuleId;
use pagerule_domain::rule::{AutomationRule, RuleDraft, RulePatch};
use pagerule_domain::time::{Timestamp, now};

use crate::ports::RuleStorage;

/// Result of [`RuleStore::update`].
#[derive(Debug, Clone)]
pub struct RuleUpdate {
    pub rule: AutomationRule,
    /// The trigger changed or `is_active` toggled.
    pub rearm: bool,
}

/// Owns the authoritative rule list.
pub struct RuleStore<S> {
    storage: Arc<S>,
    rules: RwLock<Vec<AutomationRule>>,
}

fn not_found(id: RuleId) -> PageRuleError {
    NotFoundError {
        entity: "Rule",
        id: id.to_string(),
    }
    .into()
}

impl<S: RuleStorage> RuleStore<S> {
    /// Create an empty store backed by `storage`; call [`RuleStore::load`]
    /// to read existing rules.
    pub fn new(storage: Arc<S>) -> Self {
        Self {
            storage,
            rules: RwLock::new(Vec::new()),
        }
    }

    /// Replace the in-memory list with the persisted one.
    ///
    /// # Errors
    ///
    /// Returns a storage error when the rules cannot be read.
    #[tracing::instrument(skip(self))]
    pub async fn load(&self) -> Result<usize, PageRuleError> {
        let loaded = self.storage.load_rules().await?;
        let count = loaded.len();
        *self.rules.write().await = loaded;
        tracing::debug!(count, "rules loaded");
        Ok(count)
    }

    /// Create a rule from `draft` and persist it.
    ///
    /// # Errors
    ///
    /// Returns [`PageRuleError::Validation`] if the draft breaks an
    /// invariant, or a storage error.
    #[tracing::instrument(skip(self, draft), fields(rule_name = %draft.name))]
    pub async fn create(&self, draft: RuleDraft) -> Result<AutomationRule, PageRuleError> {
        let rule = draft.into_rule(now())?;
        let mut rules = self.rules.write().await;
        let mut next = rules.clone();
        next.push(rule.clone());
        self.storage.save_rules(next.clone()).await?;
        *rules = next;
        tracing::info!(rule_id = %rule.id, "rule created");
        Ok(rule)
    }

    /// Merge `patch` into the rule with `id` and persist.
    ///
    /// # Errors
    ///
    /// Returns [`PageRuleError::NotFound`] when no rule has `id`,
    /// [`PageRuleError::Validation`] when the merged rule is invalid, or a
    /// storage error.
    #[tracing::instrument(skip(self, patch))]
    pub async fn update(&self, id: RuleId, patch: RulePatch) -> Result<RuleUpdate, PageRuleError> {
        let mut rules = self.rules.write().await;
        let mut next = rules.clone();
        let rule = next
            .iter_mut()
            .find(|rule| rule.id == id)
            .ok_or_else(|| not_found(id))?;
        let rearm = patch.apply(rule, now())?;
        let rule = rule.clone();
        self.storage.save_rules(next.clone()).await?;
        *rules = next;
        Ok(RuleUpdate { rule, rearm })
    }

    /// Remove the rule with `id` and persist, returning the removed rule.
    ///
    /// # Errors
    ///
    /// Returns [`PageRuleError::NotFound`] when no rule has `id`, or a
    /// storage error.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: RuleId) -> Result<AutomationRule, PageRuleError> {
        let mut rules = self.rules.write().await;
        let position = rules
            .iter()
            .position(|rule| rule.id == id)
            .ok_or_else(|| not_found(id))?;
        let mut next = rules.clone();
        let removed = next.remove(position);
        self.storage.save_rules(next.clone()).await?;
        *rules = next;
        tracing::info!(rule_id = %id, "rule deleted");
        Ok(removed)
    }

    pub async fn get(&self, id: RuleId) -> Option<AutomationRule> {
        self.rules.read().await.iter().find(|rule| rule.id == id).cloned()
    }

    /// Every rule, in creation order.
    pub async fn list(&self) -> Vec<AutomationRule> {
        self.rules.read().await.clone()
    }

    pub async fn active(&self) -> Vec<AutomationRule> {
        self.rules
            .read()
            .await
            .iter()
            .filter(|rule| rule.is_active)
            .cloned()
            .collect()
    }

    /// Bump the execution counter of the rule with `id` and persist.
    ///
    /// # Errors
    ///
    /// Returns [`PageRuleError::NotFound`] when the rule was deleted, or a
    /// storage error.
    pub async fn record_execution(
        &self,
        id: RuleId,
        at: Timestamp,
    ) -> Result<AutomationRule, PageRuleError> {
        let mut rules = self.rules.write().await;
        let mut next = rules.clone();
        let rule = next
            .iter_mut()
            .find(|rule| rule.id == id)
            .ok_or_else(|| not_found(id))?;
        rule.record_execution(at);
        let rule = rule.clone();
        self.storage.save_rules(next.clone()).await?;
        *rules = next;
        Ok(rule)
    }

    /// Persist a blob alongside the rules.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    pub async fn save_blob(
        &self,
        key: String,
        value: serde_json::Value,
    ) -> Result<(), PageRuleError> {
        self.storage.save_blob(key, value).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryStorage;
    use pagerule_domain::error::ValidationError;
    use pagerule_domain::rule::{Action, ActionKind, Trigger};
    use std::sync::atomic::Ordering;

    fn draft(name: &str) -> RuleDraft {
        AutomationRule::builder()
            .name(name)
            .action(Action::new(ActionKind::Notify {
                message: "hi".to_string(),
            }))
    }

    fn store() -> (Arc<InMemoryStorage>, RuleStore<InMemoryStorage>) {
        let storage = Arc::new(InMemoryStorage::default());
        (Arc::clone(&storage), RuleStore::new(storage))
    }

    #[tokio::test]
    async fn should_persist_created_rule() {
        let (storage, store) = store();
        let rule = store.create(draft("First")).await.unwrap();

        assert_eq!(store.list().await, vec![rule.clone()]);
        assert_eq!(storage.stored(), vec![rule]);
    }

    #[tokio::test]
    async fn should_reject_invalid_draft_without_persisting() {
        let (storage, store) = store();
        let result = store.create(AutomationRule::builder().name("empty")).await;

        assert!(matches!(
            result,
            Err(PageRuleError::Validation(ValidationError::NoActions))
        ));
        assert!(store.list().await.is_empty());
        assert_eq!(storage.saves.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn should_load_persisted_rules() {
        let rule = draft("Stored").into_rule(now()).unwrap();
        let storage = Arc::new(InMemoryStorage::with(vec![rule.clone()]));
        let store = RuleStore::new(storage);

        assert_eq!(store.load().await.unwrap(), 1);
        assert_eq!(store.get(rule.id).await, Some(rule));
    }

    #[tokio::test]
    async fn should_keep_memory_unchanged_when_save_fails() {
        let (storage, store) = store();
        let rule = store.create(draft("Kept")).await.unwrap();
        storage.fail_saves.store(true, Ordering::SeqCst);

        assert!(store.create(draft("Lost")).await.is_err());
        assert!(store.delete(rule.id).await.is_err());
        assert_eq!(store.list().await, vec![rule]);
    }

    #[tokio::test]
    async fn should_report_rearm_when_trigger_changes() {
        let (_, store) = store();
        let rule = store.create(draft("Rearm")).await.unwrap();

        let update = store
            .update(
                rule.id,
                RulePatch {
                    trigger: Some(Trigger::UrlChange {
                        pattern: "*".to_string(),
                    }),
                    ..RulePatch::default()
                },
            )
            .await
            .unwrap();
        assert!(update.rearm);

        let update = store
            .update(
                rule.id,
                RulePatch {
                    name: Some("Renamed".to_string()),
                    ..RulePatch::default()
                },
            )
            .await
            .unwrap();
        assert!(!update.rearm);
        assert_eq!(store.get(rule.id).await.unwrap().name, "Renamed");
    }

    #[tokio::test]
    async fn should_return_not_found_when_updating_missing_rule() {
        let (_, store) = store();
        let result = store.update(RuleId::new(), RulePatch::default()).await;
        assert!(matches!(result, Err(PageRuleError::NotFound(_))));
    }

    #[tokio::test]
    async fn should_return_not_found_when_deleting_missing_rule() {
        let (_, store) = store();
        let result = store.delete(RuleId::new()).await;
        assert!(matches!(result, Err(PageRuleError::NotFound(_))));
    }

    #[tokio::test]
    async fn should_list_only_active_rules() {
        let (_, store) = store();
        store.create(draft("On")).await.unwrap();
        store.create(draft("Off").active(false)).await.unwrap();

        let active = store.active().await;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "On");
    }

    #[tokio::test]
    async fn should_record_execution_and_persist() {
        let (storage, store) = store();
        let rule = store.create(draft("Counted")).await.unwrap();
        let at = now();

        let updated = store.record_execution(rule.id, at).await.unwrap();
        assert_eq!(updated.execution_count, 1);
        assert_eq!(storage.stored()[0].last_executed, Some(at));
    }
}
