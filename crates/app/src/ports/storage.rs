//! Storage port — durable rule list and saved page blobs.

use std::future::Future;

use pagerule_domain::error::PageRuleError;
use pagerule_domain::rule::AutomationRule;

/// Persists the rule list and arbitrary keyed JSON blobs.
///
/// The rule list is written as a whole; implementations must replace the
/// previous list atomically so a failed save leaves the old one intact.
pub trait RuleStorage: Send + Sync {
    /// Load every stored rule. An empty store yields an empty list.
    fn load_rules(&self)
    -> impl Future<Output = Result<Vec<AutomationRule>, PageRuleError>> + Send;

    /// Replace the stored rule list.
    fn save_rules(
        &self,
        rules: Vec<AutomationRule>,
    ) -> impl Future<Output = Result<(), PageRuleError>> + Send;

    /// Store `value` under `key`, overwriting any previous value.
    fn save_blob(
        &self,
        key: String,
        value: serde_json::Value,
    ) -> impl Future<Output = Result<(), PageRuleError>> + Send;

    /// Read back a blob stored with [`RuleStorage::save_blob`].
    fn get_blob(
        &self,
        key: String,
    ) -> impl Future<Output = Result<Option<serde_json::Value>, PageRuleError>> + Send;
}
