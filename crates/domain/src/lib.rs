//! # pagerule-domain
//!
//! Pure domain model for the pagerule automation engine.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Rules** (trigger → conditions → actions automation units)
//! - Define **Page contexts** (point-in-time snapshots of the environment)
//! - Define **Executions** and their lifecycle state machines
//! - Glob/regex **pattern matching** and condition operator semantics
//! - Engine-wide **statistics** derived from rules and executions
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod context;
pub mod execution;
pub mod pattern;
pub mod rule;
pub mod stats;
