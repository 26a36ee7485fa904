//! # pagerule-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement the `RuleStorage` port defined in `pagerule-app::ports::storage`
//! - Manage `SQLite` connection pool lifecycle
//! - Run database migrations (using sqlx embedded migrations)
//! - Map between domain types and JSON documents in a key-value table
//!
//! ## Dependency rule
//! Depends on `pagerule-app` (for port traits) and `pagerule-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

pub mod error;
pub mod pool;
pub mod rule_storage;

pub use error::StorageError;
pub use pool::{Config, Database};
pub use rule_storage::{RULES_KEY, SqliteRuleStorage};
