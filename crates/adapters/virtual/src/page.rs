//! Virtual page — a simulated document implementing the `Environment` port.

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::{broadcast, watch};

use pagerule_app::ports::{ElementInfo, Environment, NavigationTarget, UserEvent};
use pagerule_domain::context::{FormField, PageContext};
use pagerule_domain::error::PageRuleError;

const CHANNEL_CAPACITY: usize = 64;

/// One element of the simulated document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualElement {
    /// Selector the element answers to, besides its tag name.
    pub selector: String,
    pub tag: String,
    pub text: String,
    pub value: Option<String>,
}

impl VirtualElement {
    #[must_use]
    pub fn new(selector: impl Into<String>, tag: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            tag: tag.into(),
            text: text.into(),
            value: None,
        }
    }

    fn matches(&self, selector: &str) -> bool {
        self.selector == selector || self.tag == selector
    }

    fn editable(&self) -> bool {
        matches!(self.tag.as_str(), "input" | "textarea" | "select")
    }

    fn info(&self) -> ElementInfo {
        ElementInfo {
            tag: self.tag.clone(),
            text: self.text.clone(),
            editable: self.editable(),
        }
    }
}

/// Something done to the page through the `Environment` port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interaction {
    Scroll { selector: String },
    Click { selector: String },
    Input { selector: String, value: String },
    Event { selector: String, event: String },
}

struct PageState {
    url: String,
    title: String,
    content: String,
    page_type: Option<String>,
    form_fields: Vec<FormField>,
    elements: Vec<VirtualElement>,
    history: Vec<String>,
    tabs: Vec<String>,
    interactions: Vec<Interaction>,
}

struct Listener {
    event: String,
    selector: Option<String>,
    sender: broadcast::Sender<UserEvent>,
}

/// A simulated page.
///
/// Structural changes ([`VirtualPage::insert_element`],
/// [`VirtualPage::remove_element`], [`VirtualPage::set_content`]) notify
/// content observers; [`VirtualPage::go_to`] and same-frame navigations
/// notify navigation observers.
pub struct VirtualPage {
    state: Mutex<PageState>,
    content_changes: broadcast::Sender<()>,
    navigations: broadcast::Sender<String>,
    listeners: Mutex<Vec<Listener>>,
    ready: watch::Sender<bool>,
}

impl VirtualPage {
    #[must_use]
    pub fn new(url: impl Into<String>, title: impl Into<String>, content: impl Into<String>) -> Self {
        let url = url.into();
        let (content_changes, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (navigations, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (ready, _) = watch::channel(false);
        Self {
            state: Mutex::new(PageState {
                history: vec![url.clone()],
                url,
                title: title.into(),
                content: content.into(),
                page_type: None,
                form_fields: Vec::new(),
                elements: Vec::new(),
                tabs: Vec::new(),
                interactions: Vec::new(),
            }),
            content_changes,
            navigations,
            listeners: Mutex::new(Vec::new()),
            ready,
        }
    }

    #[must_use]
    pub fn with_page_type(self, page_type: impl Into<String>) -> Self {
        self.lock().page_type = Some(page_type.into());
        self
    }

    #[must_use]
    pub fn with_element(self, element: VirtualElement) -> Self {
        self.lock().elements.push(element);
        self
    }

    #[must_use]
    pub fn with_form_field(self, field: FormField) -> Self {
        self.lock().form_fields.push(field);
        self
    }

    fn lock(&self) -> MutexGuard<'_, PageState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn content_changed(&self) {
        // no observers is fine
        let _ = self.content_changes.send(());
    }

    /// Signal that the page finished loading.
    pub fn mark_ready(&self) {
        self.ready.send_replace(true);
    }

    pub fn insert_element(&self, element: VirtualElement) {
        self.lock().elements.push(element);
        self.content_changed();
    }

    /// Remove every element answering to `selector`; returns how many.
    pub fn remove_element(&self, selector: &str) -> usize {
        let removed = {
            let mut state = self.lock();
            let before = state.elements.len();
            state.elements.retain(|element| !element.matches(selector));
            before - state.elements.len()
        };
        if removed > 0 {
            self.content_changed();
        }
        removed
    }

    pub fn set_content(&self, content: impl Into<String>) {
        self.lock().content = content.into();
        self.content_changed();
    }

    /// In-page navigation, as a single-page application would do it.
    pub fn go_to(&self, url: impl Into<String>) {
        let url = url.into();
        {
            let mut state = self.lock();
            state.url.clone_from(&url);
            state.history.push(url.clone());
        }
        let _ = self.navigations.send(url);
    }

    /// Deliver a user interaction to the matching listeners.
    pub fn dispatch_user_event(&self, event: &str, target: Option<&str>) {
        let user_event = UserEvent {
            event: event.to_string(),
            target: target.map(str::to_string),
        };
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        listeners.retain(|listener| listener.sender.receiver_count() > 0);
        for listener in listeners.iter() {
            let selector_matches = match (&listener.selector, target) {
                (None, _) => true,
                (Some(selector), Some(target)) => selector == target,
                (Some(_), None) => false,
            };
            if listener.event == event && selector_matches {
                let _ = listener.sender.send(user_event.clone());
            }
        }
    }

    #[must_use]
    pub fn url(&self) -> String {
        self.lock().url.clone()
    }

    /// Every URL the frame has shown, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.lock().history.clone()
    }

    #[must_use]
    pub fn opened_tabs(&self) -> Vec<String> {
        self.lock().tabs.clone()
    }

    #[must_use]
    pub fn interactions(&self) -> Vec<Interaction> {
        self.lock().interactions.clone()
    }

    #[must_use]
    pub fn value_of(&self, selector: &str) -> Option<String> {
        self.lock()
            .elements
            .iter()
            .find(|element| element.matches(selector))
            .and_then(|element| element.value.clone())
    }

    /// Number of live user-event subscriptions.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        listeners.retain(|listener| listener.sender.receiver_count() > 0);
        listeners.len()
    }

    fn require(&self, selector: &str) -> Result<VirtualElement, PageRuleError> {
        self.lock()
            .elements
            .iter()
            .find(|element| element.matches(selector))
            .cloned()
            .ok_or_else(|| PageRuleError::ElementNotFound {
                selector: selector.to_string(),
            })
    }

    fn record(&self, interaction: Interaction) {
        self.lock().interactions.push(interaction);
    }
}

impl Environment for VirtualPage {
    fn snapshot(&self) -> impl Future<Output = Result<PageContext, PageRuleError>> + Send {
        let state = self.lock();
        let mut context = PageContext::new(&state.url, &state.title, &state.content);
        context.page_type.clone_from(&state.page_type);
        context.form_fields.clone_from(&state.form_fields);
        async { Ok(context) }
    }

    fn query(
        &self,
        selector: String,
    ) -> impl Future<Output = Result<Option<ElementInfo>, PageRuleError>> + Send {
        let found = self
            .lock()
            .elements
            .iter()
            .find(|element| element.matches(&selector))
            .map(VirtualElement::info);
        async { Ok(found) }
    }

    fn query_all(
        &self,
        selector: String,
    ) -> impl Future<Output = Result<Vec<ElementInfo>, PageRuleError>> + Send {
        let found = self
            .lock()
            .elements
            .iter()
            .filter(|element| element.matches(&selector))
            .map(VirtualElement::info)
            .collect();
        async { Ok(found) }
    }

    fn scroll_into_view(
        &self,
        selector: String,
    ) -> impl Future<Output = Result<(), PageRuleError>> + Send {
        let result = self
            .require(&selector)
            .map(|_| self.record(Interaction::Scroll { selector }));
        async { result }
    }

    fn click(&self, selector: String) -> impl Future<Output = Result<(), PageRuleError>> + Send {
        let result = self.require(&selector).map(|_| {
            self.record(Interaction::Click {
                selector: selector.clone(),
            });
            self.dispatch_user_event("click", Some(&selector));
        });
        async { result }
    }

    fn set_value(
        &self,
        selector: String,
        value: String,
    ) -> impl Future<Output = Result<(), PageRuleError>> + Send {
        let result = {
            let mut guard = self.lock();
            let state = &mut *guard;
            match state
                .elements
                .iter_mut()
                .find(|element| element.matches(&selector))
            {
                Some(element) if element.editable() => {
                    element.value = Some(value.clone());
                    state.interactions.push(Interaction::Input { selector, value });
                    Ok(())
                }
                Some(_) => Err(PageRuleError::NotEditable { selector }),
                None => Err(PageRuleError::ElementNotFound { selector }),
            }
        };
        async { result }
    }

    fn dispatch(
        &self,
        selector: String,
        event: String,
    ) -> impl Future<Output = Result<(), PageRuleError>> + Send {
        let result = self.require(&selector).map(|_| {
            self.dispatch_user_event(&event, Some(&selector));
            self.record(Interaction::Event { selector, event });
        });
        async { result }
    }

    fn navigate(
        &self,
        url: String,
        target: NavigationTarget,
    ) -> impl Future<Output = Result<(), PageRuleError>> + Send {
        match target {
            NavigationTarget::CurrentFrame => self.go_to(url),
            NavigationTarget::NewTab => self.lock().tabs.push(url),
        }
        async { Ok(()) }
    }

    fn ready(&self) -> impl Future<Output = ()> + Send {
        let mut ready = self.ready.subscribe();
        async move {
            // the sender lives as long as the page
            let _ = ready.wait_for(|ready| *ready).await;
        }
    }

    fn content_changes(&self) -> broadcast::Receiver<()> {
        self.content_changes.subscribe()
    }

    fn navigations(&self) -> broadcast::Receiver<String> {
        self.navigations.subscribe()
    }

    fn user_events(&self, event: &str, selector: Option<&str>) -> broadcast::Receiver<UserEvent> {
        let (sender, receiver) = broadcast::channel(CHANNEL_CAPACITY);
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Listener {
                event: event.to_string(),
                selector: selector.map(str::to_string),
                sender,
            });
        receiver
    }
}
