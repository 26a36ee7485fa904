//! # pagerule-app
//!
//! Application layer — the automation engine and its **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `RuleStorage` — durable rule list and saved blobs
//!   - `Environment` — the live page: reads, element probes, effects, notifications
//!   - `AiProcessor` — summarize / extract entities / analyze sentiment
//!   - `Notifier` — best-effort user notifications
//! - Provide the engine components:
//!   - `RuleStore` — CRUD + persistence of rules
//!   - `ConditionEvaluator` — conjunction of rule conditions over a page context
//!   - `TriggerWatcher` — global and per-rule trigger registration
//!   - `ActionExecutor` — dispatch of each action type
//!   - `ExecutionTracker` — execution state machines and queries
//!   - `AutomationEngine` — the facade wiring them together
//! - Provide **in-process infrastructure** (execution bus) that doesn't need IO
//!
//! ## Dependency rule
//! Depends on `pagerule-domain` only (plus `tokio` for tasks, channels and timers).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod action_executor;
pub mod condition_evaluator;
pub mod config;
pub mod engine;
pub mod event_bus;
pub mod execution_tracker;
pub mod ports;
pub mod rule_store;
pub mod trigger_watcher;

#[cfg(test)]
pub(crate) mod testing;
