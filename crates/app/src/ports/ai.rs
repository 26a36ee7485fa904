//! AI port — text analysis used by `ai_process` actions.

use std::future::Future;

use pagerule_domain::error::PageRuleError;
use pagerule_domain::rule::Sentiment;

/// Analyses page text.
pub trait AiProcessor: Send + Sync {
    fn summarize(&self, text: String) -> impl Future<Output = Result<String, PageRuleError>> + Send;

    fn extract_entities(
        &self,
        text: String,
    ) -> impl Future<Output = Result<Vec<String>, PageRuleError>> + Send;

    fn analyze_sentiment(
        &self,
        text: String,
    ) -> impl Future<Output = Result<Sentiment, PageRuleError>> + Send;
}
