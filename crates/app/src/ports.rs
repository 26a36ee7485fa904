//! Port definitions — traits that adapters implement.
//!
//! Ports are the boundaries between the engine and the outside world.
//! They are defined here (in `app`) so that both the engine and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod ai;
pub mod environment;
pub mod notifier;
pub mod storage;

pub use ai::AiProcessor;
pub use environment::{ElementInfo, Environment, NavigationTarget, UserEvent};
pub use notifier::{Delivery, Notifier};
pub use storage::RuleStorage;
