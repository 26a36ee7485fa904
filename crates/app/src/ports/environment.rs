//! Environment port — the live page the engine observes and acts on.
//!
//! Reads are snapshots: nothing returned here stays in sync with the page.
//! Notification sources are broadcast receivers; dropping the receiver is
//! the unsubscribe.

use std::future::Future;

use tokio::sync::broadcast;

use pagerule_domain::context::PageContext;
use pagerule_domain::error::PageRuleError;

/// What a selector resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementInfo {
    pub tag: String,
    /// Visible text content, untrimmed.
    pub text: String,
    /// Whether the element accepts a value (input, textarea, select, ...).
    pub editable: bool,
}

/// A user interaction observed on the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserEvent {
    /// DOM-style event type, e.g. `click` or `submit`.
    pub event: String,
    /// Selector of the element the event targeted, if any.
    pub target: Option<String>,
}

/// Where a navigation lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationTarget {
    CurrentFrame,
    NewTab,
}

/// The page, as seen by the engine.
pub trait Environment: Send + Sync {
    /// Capture url, title, content, form fields and page type.
    fn snapshot(&self) -> impl Future<Output = Result<PageContext, PageRuleError>> + Send;

    /// First element matching `selector`.
    fn query(
        &self,
        selector: String,
    ) -> impl Future<Output = Result<Option<ElementInfo>, PageRuleError>> + Send;

    /// Every element matching `selector`, in document order.
    fn query_all(
        &self,
        selector: String,
    ) -> impl Future<Output = Result<Vec<ElementInfo>, PageRuleError>> + Send;

    /// Whether any element matches `selector`.
    fn element_exists(
        &self,
        selector: String,
    ) -> impl Future<Output = Result<bool, PageRuleError>> + Send {
        async move { Ok(self.query(selector).await?.is_some()) }
    }

    fn scroll_into_view(
        &self,
        selector: String,
    ) -> impl Future<Output = Result<(), PageRuleError>> + Send;

    fn click(&self, selector: String) -> impl Future<Output = Result<(), PageRuleError>> + Send;

    /// Set the element's value without emitting any event.
    fn set_value(
        &self,
        selector: String,
        value: String,
    ) -> impl Future<Output = Result<(), PageRuleError>> + Send;

    /// Emit a synthetic `event` on the element.
    fn dispatch(
        &self,
        selector: String,
        event: String,
    ) -> impl Future<Output = Result<(), PageRuleError>> + Send;

    fn navigate(
        &self,
        url: String,
        target: NavigationTarget,
    ) -> impl Future<Output = Result<(), PageRuleError>> + Send;

    /// Resolves once the page reports it finished loading; immediately if
    /// it already has.
    fn ready(&self) -> impl Future<Output = ()> + Send;

    /// Fires on every structural change to the page content.
    fn content_changes(&self) -> broadcast::Receiver<()>;

    /// Fires with the new URL on every in-page navigation.
    fn navigations(&self) -> broadcast::Receiver<String>;

    /// Fires on every `event` whose target matches `selector`, or on every
    /// `event` when no selector is given.
    fn user_events(&self, event: &str, selector: Option<&str>)
    -> broadcast::Receiver<UserEvent>;
}
