//! Auxiliary read-cache rows swept by the maintainer.
//!
//! The cache's content model is owned by the read path; this repository
//! only tracks keys, payload sizes, and ages for size-based eviction.

use std::sync::Arc;

use chrono::Utc;
use rusqlite::params;
use tokio::task;

use super::manager::{map_join_error, map_sql_error, DbManager};
use steeple_domain::Result;

/// SQLite-backed read-cache repository.
pub struct CacheRepository {
    db: Arc<DbManager>,
}

impl CacheRepository {
    /// Construct a repository backed by the shared database manager.
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    /// Upsert a cache entry stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns `SteepleError::Database` when the write fails.
    pub async fn put(&self, key: &str, payload: Vec<u8>) -> Result<()> {
        self.put_at(key, payload, Utc::now().timestamp_millis()).await
    }

    /// Upsert a cache entry with an explicit timestamp (unix ms).
    ///
    /// # Errors
    ///
    /// Returns `SteepleError::Database` when the write fails.
    pub async fn put_at(&self, key: &str, payload: Vec<u8>, cached_at: i64) -> Result<()> {
        let db = Arc::clone(&self.db);
        let key = key.to_string();

        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            let size = i64::try_from(payload.len()).unwrap_or(i64::MAX);
            conn.execute(
                "INSERT OR REPLACE INTO read_cache (cache_key, payload, size_bytes, cached_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![key, payload, size, cached_at],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    /// Total payload bytes currently cached.
    ///
    /// # Errors
    ///
    /// Returns `SteepleError::Database` when the query fails.
    pub async fn total_size(&self) -> Result<u64> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> Result<u64> {
            let conn = db.get_connection()?;
            let total: i64 = conn
                .query_row("SELECT COALESCE(SUM(size_bytes), 0) FROM read_cache", [], |row| {
                    row.get(0)
                })
                .map_err(map_sql_error)?;
            Ok(u64::try_from(total).unwrap_or(0))
        })
        .await
        .map_err(map_join_error)?
    }

    /// Number of entries older than the cutoff (unix ms).
    ///
    /// # Errors
    ///
    /// Returns `SteepleError::Database` when the query fails.
    pub async fn count_older_than(&self, cutoff: i64) -> Result<usize> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> Result<usize> {
            let conn = db.get_connection()?;
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM read_cache WHERE cached_at < ?1",
                    params![cutoff],
                    |row| row.get(0),
                )
                .map_err(map_sql_error)?;
            Ok(usize::try_from(count).unwrap_or(0))
        })
        .await
        .map_err(map_join_error)?
    }

    /// Delete up to `limit` entries older than the cutoff (unix ms).
    ///
    /// Returns the number of rows deleted.
    ///
    /// # Errors
    ///
    /// Returns `SteepleError::Database` when the delete fails.
    pub async fn delete_older_than(&self, cutoff: i64, limit: usize) -> Result<usize> {
        let db = Arc::clone(&self.db);
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        task::spawn_blocking(move || -> Result<usize> {
            let conn = db.get_connection()?;
            let deleted = conn
                .execute(
                    "DELETE FROM read_cache WHERE cache_key IN (
                        SELECT cache_key FROM read_cache WHERE cached_at < ?1
                        ORDER BY cached_at ASC LIMIT ?2
                    )",
                    params![cutoff, limit],
                )
                .map_err(map_sql_error)?;
            Ok(deleted)
        })
        .await
        .map_err(map_join_error)?
    }

    /// Number of live cache entries.
    ///
    /// # Errors
    ///
    /// Returns `SteepleError::Database` when the query fails.
    pub async fn count(&self) -> Result<usize> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> Result<usize> {
            let conn = db.get_connection()?;
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM read_cache", [], |row| row.get(0))
                .map_err(map_sql_error)?;
            Ok(usize::try_from(count).unwrap_or(0))
        })
        .await
        .map_err(map_join_error)?
    }
}
