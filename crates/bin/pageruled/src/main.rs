//! # pageruled — page automation daemon
//!
//! Composition root that wires the engine to its collaborators and runs it
//! until interrupted.
//!
//! ## Responsibilities
//! - Parse configuration (config file, env vars)
//! - Initialise logging
//! - Open the `SQLite` store and run migrations
//! - Build the simulated page and the AI/notification collaborators
//! - Start the engine, importing seed rules into an empty store
//! - Report finished executions
//! - Handle graceful shutdown (Ctrl-C)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use pagerule_adapter_storage_sqlite_sqlx::Config as StorageConfig;
use pagerule_adapter_virtual::{HeuristicAi, LogNotifier, VirtualPage};
use pagerule_app::engine::AutomationEngine;
use pagerule_domain::execution::AutomationExecution;
use pagerule_domain::rule::RuleDraft;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.logging.filter).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Database
    let db = StorageConfig {
        database_url: config.database_url().to_string(),
    }
    .build()
    .await
    .with_context(|| format!("failed to open database {}", config.database_url()))?;

    // Collaborators
    let mut page = VirtualPage::new(&config.page.url, &config.page.title, &config.page.content);
    if let Some(page_type) = &config.page.page_type {
        page = page.with_page_type(page_type);
    }
    let page = Arc::new(page);

    let engine = AutomationEngine::new(
        Arc::new(db.rule_storage()),
        Arc::clone(&page),
        Arc::new(HeuristicAi::new()),
        Arc::new(LogNotifier::new()),
        config.engine_config(),
    );
    engine.start().await.context("failed to start engine")?;

    if let Some(path) = &config.rules.import {
        if engine.list_rules().await.is_empty() {
            let drafts = read_drafts(path)?;
            let created = engine
                .import_rules(drafts)
                .await
                .with_context(|| format!("failed to import rules from {}", path.display()))?;
            tracing::info!(count = created.len(), path = %path.display(), "rules imported");
        } else {
            tracing::debug!(path = %path.display(), "store not empty, import skipped");
        }
    }

    let mut executions = engine.subscribe_executions();
    let reporter = tokio::spawn(async move {
        loop {
            match executions.recv().await {
                Ok(execution) => report(&execution),
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "execution reporter lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    page.mark_ready();
    tracing::info!(url = %config.page.url, "pageruled running, press Ctrl-C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    engine.stop();
    engine.wait_for_idle().await;
    reporter.abort();

    let stats = engine.stats().await;
    tracing::info!(
        rules = stats.total_rules,
        executions = stats.total_executions,
        succeeded = stats.successful_executions,
        failed = stats.failed_executions,
        time_saved_secs = stats.time_saved_secs,
        "shutting down"
    );
    db.close().await;

    Ok(())
}

fn read_drafts(path: &Path) -> anyhow::Result<Vec<RuleDraft>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("invalid rule file {}", path.display()))
}

fn report(execution: &AutomationExecution) {
    tracing::info!(
        execution_id = %execution.id,
        rule_id = %execution.rule_id,
        status = %execution.status,
        duration_ms = execution.duration_ms,
        error = execution.error.as_deref(),
        "execution finished"
    );
}
