//! # pagerule-adapter-virtual
//!
//! In-process collaborators for running the engine without a browser.
//!
//! ## Provided collaborators
//!
//! | Collaborator | Port | Behaviour |
//! |--------------|------|-----------|
//! | [`VirtualPage`] | `Environment` | Selector-keyed element table, history, tabs and event listeners |
//! | [`HeuristicAi`] | `AiProcessor` | Leading-sentence summary, capitalised-word entities, word-list sentiment |
//! | [`LogNotifier`] | `Notifier` | Emits notifications as `tracing` events, or refuses them |
//!
//! ## Dependency rule
//!
//! Depends on `pagerule-app` (port traits) and `pagerule-domain` only.

mod ai;
mod notifier;
mod page;

pub use ai::HeuristicAi;
pub use notifier::LogNotifier;
pub use page::{Interaction, VirtualElement, VirtualPage};
