//! Single-record persistence for the sync policy and counters.
//!
//! Both collections are one-row tables holding a JSON document; the
//! stats row is rewritten in full after every cycle. Missing rows fall
//! back to defaults, so a fresh database needs no seeding step.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use tokio::task;
use tracing::warn;

use super::manager::{map_join_error, map_sql_error, DbManager};
use steeple_core::{ConfigStore, StatsStore};
use steeple_domain::{Result, SteepleError, SyncConfig, SyncStats};

/// SQLite-backed config and stats repository.
pub struct SqliteSettingsRepository {
    db: Arc<DbManager>,
}

impl SqliteSettingsRepository {
    /// Construct a repository backed by the shared database manager.
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    async fn load_document(&self, table: &'static str) -> Result<Option<String>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> Result<Option<String>> {
            let conn = db.get_connection()?;
            let sql = match table {
                "sync_config" => "SELECT config_json FROM sync_config WHERE id = 1",
                _ => "SELECT stats_json FROM sync_stats WHERE id = 1",
            };
            conn.query_row(sql, [], |row| row.get::<_, String>(0))
                .optional()
                .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn save_document(&self, table: &'static str, document: String) -> Result<()> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            let sql = match table {
                "sync_config" => {
                    "INSERT OR REPLACE INTO sync_config (id, config_json, updated_at) VALUES (1, ?1, ?2)"
                }
                _ => "INSERT OR REPLACE INTO sync_stats (id, stats_json, updated_at) VALUES (1, ?1, ?2)",
            };
            conn.execute(sql, params![document, Utc::now().timestamp_millis()])
                .map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }
}

#[async_trait]
impl ConfigStore for SqliteSettingsRepository {
    async fn load_config(&self) -> Result<SyncConfig> {
        match self.load_document("sync_config").await? {
            Some(raw) => serde_json::from_str(&raw).map_or_else(
                |err| {
                    warn!(error = %err, "malformed sync_config row; using defaults");
                    Ok(SyncConfig::default())
                },
                Ok,
            ),
            None => Ok(SyncConfig::default()),
        }
    }

    async fn save_config(&self, config: &SyncConfig) -> Result<()> {
        let document = serde_json::to_string(config)
            .map_err(|e| SteepleError::InvalidInput(format!("config: {e}")))?;
        self.save_document("sync_config", document).await
    }
}

#[async_trait]
impl StatsStore for SqliteSettingsRepository {
    async fn load_stats(&self) -> Result<SyncStats> {
        match self.load_document("sync_stats").await? {
            Some(raw) => serde_json::from_str(&raw).map_or_else(
                |err| {
                    warn!(error = %err, "malformed sync_stats row; using defaults");
                    Ok(SyncStats::default())
                },
                Ok,
            ),
            None => Ok(SyncStats::default()),
        }
    }

    async fn save_stats(&self, stats: &SyncStats) -> Result<()> {
        let document = serde_json::to_string(stats)
            .map_err(|e| SteepleError::InvalidInput(format!("stats: {e}")))?;
        self.save_document("sync_stats", document).await
    }
}
