//! Offline text analysis backing the `AiProcessor` port.

use std::collections::HashSet;
use std::future::Future;

use pagerule_app::ports::AiProcessor;
use pagerule_domain::error::PageRuleError;
use pagerule_domain::rule::Sentiment;

const SUMMARY_MAX_CHARS: usize = 200;

const POSITIVE_WORDS: &[&str] = &[
    "good", "great", "excellent", "love", "happy", "best", "awesome", "nice", "wonderful",
    "fantastic", "success", "enjoy",
];

const NEGATIVE_WORDS: &[&str] = &[
    "bad", "terrible", "awful", "hate", "sad", "worst", "poor", "broken", "fail", "failure",
    "error", "problem",
];

/// Rule-of-thumb analysis with no model behind it.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicAi;

impl HeuristicAi {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn sentences(text: &str) -> impl Iterator<Item = &str> {
    text.split_inclusive(['.', '!', '?'])
        .map(str::trim)
        .filter(|sentence| !sentence.is_empty())
}

/// Leading sentences that fit the summary length; the first sentence is
/// cut at a char boundary when it alone is too long.
fn summarize(text: &str) -> String {
    let mut summary = String::new();
    for sentence in sentences(text) {
        let separator = usize::from(!summary.is_empty());
        if summary.chars().count() + separator + sentence.chars().count() > SUMMARY_MAX_CHARS {
            break;
        }
        if !summary.is_empty() {
            summary.push(' ');
        }
        summary.push_str(sentence);
    }
    if summary.is_empty() {
        summary = text.trim().chars().take(SUMMARY_MAX_CHARS).collect();
    }
    summary
}

/// Capitalised words that do not open a sentence, first occurrence order.
fn extract_entities(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut entities = Vec::new();
    for sentence in sentences(text) {
        for word in sentence.split_whitespace().skip(1) {
            let word = word.trim_matches(|c: char| !c.is_alphanumeric());
            let starts_upper = word.chars().next().is_some_and(char::is_uppercase);
            if starts_upper && seen.insert(word.to_string()) {
                entities.push(word.to_string());
            }
        }
    }
    entities
}

fn analyze_sentiment(text: &str) -> Sentiment {
    let mut balance: i64 = 0;
    for word in text.split_whitespace() {
        let word = word
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        if POSITIVE_WORDS.contains(&word.as_str()) {
            balance += 1;
        } else if NEGATIVE_WORDS.contains(&word.as_str()) {
            balance -= 1;
        }
    }
    match balance {
        b if b > 0 => Sentiment::Positive,
        b if b < 0 => Sentiment::Negative,
        _ => Sentiment::Neutral,
    }
}

impl AiProcessor for HeuristicAi {
    fn summarize(&self, text: String) -> impl Future<Output = Result<String, PageRuleError>> + Send {
        let summary = summarize(&text);
        tracing::debug!(input_len = text.len(), summary_len = summary.len(), "summarized");
        async { Ok(summary) }
    }

    fn extract_entities(
        &self,
        text: String,
    ) -> impl Future<Output = Result<Vec<String>, PageRuleError>> + Send {
        let entities = extract_entities(&text);
        async { Ok(entities) }
    }

    fn analyze_sentiment(
        &self,
        text: String,
    ) -> impl Future<Output = Result<Sentiment, PageRuleError>> + Send {
        let sentiment = analyze_sentiment(&text);
        async move { Ok(sentiment) }
    }
}
