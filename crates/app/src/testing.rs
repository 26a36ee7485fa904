//! In-memory doubles for the ports, shared by the unit tests.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::{broadcast, watch};

use pagerule_domain::context::PageContext;
use pagerule_domain::error::PageRuleError;
use pagerule_domain::rule::{AutomationRule, Sentiment};

use crate::ports::{
    AiProcessor, Delivery, ElementInfo, Environment, NavigationTarget, Notifier, RuleStorage,
    UserEvent,
};

#[derive(Default)]
pub(crate) struct InMemoryStorage {
    pub rules: Mutex<Vec<AutomationRule>>,
    pub blobs: Mutex<HashMap<String, serde_json::Value>>,
    pub fail_saves: AtomicBool,
    pub saves: AtomicUsize,
}

impl InMemoryStorage {
    pub fn with(rules: Vec<AutomationRule>) -> Self {
        Self {
            rules: Mutex::new(rules),
            ..Self::default()
        }
    }

    pub fn stored(&self) -> Vec<AutomationRule> {
        self.rules.lock().unwrap().clone()
    }
}

impl RuleStorage for InMemoryStorage {
    fn load_rules(
        &self,
    ) -> impl Future<Output = Result<Vec<AutomationRule>, PageRuleError>> + Send {
        let r = self.rules.lock().unwrap().clone();
        async { Ok(r) }
    }

    fn save_rules(
        &self,
        rules: Vec<AutomationRule>,
    ) -> impl Future<Output = Result<(), PageRuleError>> + Send {
        let r = if self.fail_saves.load(Ordering::SeqCst) {
            Err(PageRuleError::Persistence("disk full".into()))
        } else {
            *self.rules.lock().unwrap() = rules;
            self.saves.fetch_add(1, Ordering::SeqCst);
            Ok(())
        };
        async { r }
    }

    fn save_blob(
        &self,
        key: String,
        value: serde_json::Value,
    ) -> impl Future<Output = Result<(), PageRuleError>> + Send {
        self.blobs.lock().unwrap().insert(key, value);
        async { Ok(()) }
    }

    fn get_blob(
        &self,
        key: String,
    ) -> impl Future<Output = Result<Option<serde_json::Value>, PageRuleError>> + Send {
        let r = self.blobs.lock().unwrap().get(&key).cloned();
        async { Ok(r) }
    }
}

#[derive(Default)]
pub(crate) struct PageState {
    pub url: String,
    pub title: String,
    pub content: String,
    pub page_type: Option<String>,
    pub elements: Vec<(String, ElementInfo)>,
    /// Selectors whose lookup fails.
    pub broken: Vec<String>,
    pub clicks: Vec<String>,
    pub scrolled: Vec<String>,
    pub values: HashMap<String, String>,
    pub dispatched: Vec<(String, String)>,
    pub navigations: Vec<(String, NavigationTarget)>,
    pub snapshots: usize,
    pub fail_snapshots: bool,
}

pub(crate) struct FakePage {
    pub state: Mutex<PageState>,
    content_tx: broadcast::Sender<()>,
    navigation_tx: broadcast::Sender<String>,
    listeners: Mutex<Vec<(String, Option<String>, broadcast::Sender<UserEvent>)>>,
    ready: watch::Sender<bool>,
}

impl FakePage {
    pub fn new(url: &str) -> Self {
        let (content_tx, _) = broadcast::channel(64);
        let (navigation_tx, _) = broadcast::channel(64);
        let (ready, _) = watch::channel(false);
        Self {
            state: Mutex::new(PageState {
                url: url.to_string(),
                title: "Fake".to_string(),
                ..PageState::default()
            }),
            content_tx,
            navigation_tx,
            listeners: Mutex::new(Vec::new()),
            ready,
        }
    }

    pub fn with_content(self, content: &str) -> Self {
        self.state.lock().unwrap().content = content.to_string();
        self
    }

    pub fn with_element(self, selector: &str, text: &str, editable: bool) -> Self {
        self.state.lock().unwrap().elements.push((
            selector.to_string(),
            ElementInfo {
                tag: if editable { "input" } else { "div" }.to_string(),
                text: text.to_string(),
                editable,
            },
        ));
        self
    }

    pub fn with_broken_selector(self, selector: &str) -> Self {
        self.state.lock().unwrap().broken.push(selector.to_string());
        self
    }

    pub fn mark_ready(&self) {
        self.ready.send_replace(true);
    }

    pub fn change_content(&self) {
        let _ = self.content_tx.send(());
    }

    pub fn navigate_in_page(&self, url: &str) {
        self.state.lock().unwrap().url = url.to_string();
        let _ = self.navigation_tx.send(url.to_string());
    }

    pub fn fire(&self, event: &str, target: Option<&str>) {
        let user_event = UserEvent {
            event: event.to_string(),
            target: target.map(str::to_string),
        };
        let mut listeners = self.listeners.lock().unwrap();
        listeners.retain(|(_, _, tx)| tx.receiver_count() > 0);
        for (name, selector, tx) in listeners.iter() {
            let selector_matches = selector.is_none() || selector.as_deref() == target;
            if name == event && selector_matches {
                let _ = tx.send(user_event.clone());
            }
        }
    }

    pub fn listener_count(&self) -> usize {
        let mut listeners = self.listeners.lock().unwrap();
        listeners.retain(|(_, _, tx)| tx.receiver_count() > 0);
        listeners.len()
    }

    pub fn snapshots(&self) -> usize {
        self.state.lock().unwrap().snapshots
    }
}

impl Environment for FakePage {
    fn snapshot(&self) -> impl Future<Output = Result<PageContext, PageRuleError>> + Send {
        let mut state = self.state.lock().unwrap();
        state.snapshots += 1;
        let r = if state.fail_snapshots {
            Err(PageRuleError::collaborator("page detached"))
        } else {
            let mut ctx = PageContext::new(&state.url, &state.title, &state.content);
            ctx.page_type.clone_from(&state.page_type);
            Ok(ctx)
        };
        async { r }
    }

    fn query(
        &self,
        selector: String,
    ) -> impl Future<Output = Result<Option<ElementInfo>, PageRuleError>> + Send {
        let state = self.state.lock().unwrap();
        let r = if state.broken.contains(&selector) {
            Err(PageRuleError::collaborator("invalid selector"))
        } else {
            Ok(state
                .elements
                .iter()
                .find(|(s, _)| *s == selector)
                .map(|(_, info)| info.clone()))
        };
        async { r }
    }

    fn query_all(
        &self,
        selector: String,
    ) -> impl Future<Output = Result<Vec<ElementInfo>, PageRuleError>> + Send {
        let r = self
            .state
            .lock()
            .unwrap()
            .elements
            .iter()
            .filter(|(s, _)| *s == selector)
            .map(|(_, info)| info.clone())
            .collect();
        async { Ok(r) }
    }

    fn scroll_into_view(
        &self,
        selector: String,
    ) -> impl Future<Output = Result<(), PageRuleError>> + Send {
        self.state.lock().unwrap().scrolled.push(selector);
        async { Ok(()) }
    }

    fn click(&self, selector: String) -> impl Future<Output = Result<(), PageRuleError>> + Send {
        self.state.lock().unwrap().clicks.push(selector);
        async { Ok(()) }
    }

    fn set_value(
        &self,
        selector: String,
        value: String,
    ) -> impl Future<Output = Result<(), PageRuleError>> + Send {
        self.state.lock().unwrap().values.insert(selector, value);
        async { Ok(()) }
    }

    fn dispatch(
        &self,
        selector: String,
        event: String,
    ) -> impl Future<Output = Result<(), PageRuleError>> + Send {
        self.state.lock().unwrap().dispatched.push((selector, event));
        async { Ok(()) }
    }

    fn navigate(
        &self,
        url: String,
        target: NavigationTarget,
    ) -> impl Future<Output = Result<(), PageRuleError>> + Send {
        self.state.lock().unwrap().navigations.push((url, target));
        async { Ok(()) }
    }

    fn ready(&self) -> impl Future<Output = ()> + Send {
        let mut rx = self.ready.subscribe();
        async move {
            let _ = rx.wait_for(|ready| *ready).await;
        }
    }

    fn content_changes(&self) -> broadcast::Receiver<()> {
        self.content_tx.subscribe()
    }

    fn navigations(&self) -> broadcast::Receiver<String> {
        self.navigation_tx.subscribe()
    }

    fn user_events(&self, event: &str, selector: Option<&str>) -> broadcast::Receiver<UserEvent> {
        let (tx, rx) = broadcast::channel(16);
        self.listeners.lock().unwrap().push((
            event.to_string(),
            selector.map(str::to_string),
            tx,
        ));
        rx
    }
}

/// Deterministic stand-in for a language model.
#[derive(Default)]
pub(crate) struct EchoAi;

impl AiProcessor for EchoAi {
    fn summarize(&self, text: String) -> impl Future<Output = Result<String, PageRuleError>> + Send {
        let r = text.chars().take(12).collect::<String>();
        async { Ok(r) }
    }

    fn extract_entities(
        &self,
        text: String,
    ) -> impl Future<Output = Result<Vec<String>, PageRuleError>> + Send {
        let r = text
            .split_whitespace()
            .filter(|word| word.chars().next().is_some_and(char::is_uppercase))
            .map(str::to_string)
            .collect();
        async { Ok(r) }
    }

    fn analyze_sentiment(
        &self,
        text: String,
    ) -> impl Future<Output = Result<Sentiment, PageRuleError>> + Send {
        let r = if text.contains("great") {
            Sentiment::Positive
        } else {
            Sentiment::Neutral
        };
        async move { Ok(r) }
    }
}

pub(crate) struct SpyNotifier {
    pub delivery: Delivery,
    pub messages: Mutex<Vec<String>>,
}

impl Default for SpyNotifier {
    fn default() -> Self {
        Self {
            delivery: Delivery::Delivered,
            messages: Mutex::new(Vec::new()),
        }
    }
}

impl Notifier for SpyNotifier {
    fn notify(&self, message: String) -> impl Future<Output = Delivery> + Send {
        self.messages.lock().unwrap().push(message);
        let delivery = self.delivery;
        async move { delivery }
    }
}
