//! `SQLite` implementation of [`RuleStorage`].
//!
//! Everything lives in one `kv` table of JSON documents: the rule list under
//! [`RULES_KEY`], saved pages under their own keys.

use sqlx::SqlitePool;

use pagerule_app::ports::RuleStorage;
use pagerule_domain::error::PageRuleError;
use pagerule_domain::rule::AutomationRule;

use crate::error::StorageError;

/// Key the whole rule list is stored under.
pub const RULES_KEY: &str = "automation_rules";

const UPSERT: &str = "INSERT INTO kv (key, value, updated_at) VALUES (?, ?, ?) \
     ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at";

/// `SQLite`-backed rule storage.
#[derive(Clone)]
pub struct SqliteRuleStorage {
    pool: SqlitePool,
}

impl SqliteRuleStorage {
    /// Create a new storage backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM kv WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(value,)| value))
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(UPSERT)
            .bind(key)
            .bind(value)
            .bind(chrono::Utc::now().to_rfc3339())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}

impl RuleStorage for SqliteRuleStorage {
    async fn load_rules(&self) -> Result<Vec<AutomationRule>, PageRuleError> {
        let Some(document) = self.read(RULES_KEY).await? else {
            return Ok(Vec::new());
        };
        let rules: Vec<AutomationRule> =
            serde_json::from_str(&document).map_err(StorageError::from)?;
        Ok(rules)
    }

    async fn save_rules(&self, rules: Vec<AutomationRule>) -> Result<(), PageRuleError> {
        let document = serde_json::to_string(&rules).map_err(StorageError::from)?;
        self.write(RULES_KEY, &document).await?;
        tracing::debug!(count = rules.len(), "rules saved");
        Ok(())
    }

    async fn save_blob(&self, key: String, value: serde_json::Value) -> Result<(), PageRuleError> {
        let document = serde_json::to_string(&value).map_err(StorageError::from)?;
        self.write(&key, &document).await?;
        Ok(())
    }

    async fn get_blob(&self, key: String) -> Result<Option<serde_json::Value>, PageRuleError> {
        let Some(document) = self.read(&key).await? else {
            return Ok(None);
        };
        let value = serde_json::from_str(&document).map_err(StorageError::from)?;
        Ok(Some(value))
    }
}
