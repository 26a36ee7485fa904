//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `pagerule.toml` in the working directory. Every field has a
//! default so the file is optional. Environment variables take precedence
//! over file values.

use std::path::PathBuf;
use std::time::Duration;

use pagerule_app::config::EngineConfig;
use pagerule_domain::stats::DEFAULT_TIME_SAVED_PER_EXECUTION_SECS;
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub engine: EngineSection,
    /// Initial state of the simulated page.
    pub page: PageConfig,
    pub rules: RulesConfig,
}

/// `SQLite` database configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `SQLite` connection URL or file path.
    pub url: String,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Engine timings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    pub content_debounce_ms: u64,
    pub navigation_debounce_ms: u64,
    pub schedule_poll_secs: u64,
    pub time_saved_per_execution_secs: u64,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PageConfig {
    pub url: String,
    pub title: String,
    pub content: String,
    pub page_type: Option<String>,
}

/// Startup rule import.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// JSON array of rule drafts, imported when the store is empty.
    pub import: Option<PathBuf>,
}

impl Config {
    /// Load configuration from `pagerule.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// result fails validation.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("pagerule.toml")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("PAGERULE_DATABASE_URL") {
            self.database.url = val;
        }
        if let Ok(val) = std::env::var("PAGERULE_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("PAGERULE_RULES_IMPORT") {
            self.rules.import = Some(PathBuf::from(val));
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.schedule_poll_secs == 0 {
            return Err(ConfigError::Validation(
                "engine.schedule_poll_secs must be non-zero".to_string(),
            ));
        }
        if self.page.url.trim().is_empty() {
            return Err(ConfigError::Validation("page.url must not be empty".to_string()));
        }
        Ok(())
    }

    /// Return the database URL in `sqlx`-compatible format.
    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database.url
    }

    /// Engine timings derived from the `[engine]` section.
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            content_debounce: Duration::from_millis(self.engine.content_debounce_ms),
            navigation_debounce: Duration::from_millis(self.engine.navigation_debounce_ms),
            schedule_poll_interval: Duration::from_secs(self.engine.schedule_poll_secs),
            time_saved_per_execution_secs: self.engine.time_saved_per_execution_secs,
            ..EngineConfig::default()
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:pagerule.db?mode=rwc".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "pageruled=info,pagerule_app=info,pagerule_adapter_virtual=info".to_string(),
        }
    }
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            content_debounce_ms: 1000,
            navigation_debounce_ms: 250,
            schedule_poll_secs: 60,
            time_saved_per_execution_secs: DEFAULT_TIME_SAVED_PER_EXECUTION_SECS,
        }
    }
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            url: "https://example.com/".to_string(),
            title: "Example Domain".to_string(),
            content: "This domain is for use in illustrative examples.".to_string(),
            page_type: None,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
