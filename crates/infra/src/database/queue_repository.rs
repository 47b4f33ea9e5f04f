//! SQLite-backed implementation of the operation store port.
//!
//! The queue collection is keyed by operation id with secondary indexes
//! on (priority, enqueue time), kind, and retry count. Retry-count
//! updates are a single UPDATE statement, so concurrent update/remove on
//! the same id are serialized by SQLite rather than by caller ordering.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{params, Row};
use tokio::task;
use tracing::warn;

use super::manager::{map_join_error, map_sql_error, DbConnection, DbManager};
use steeple_core::OperationStore;
use steeple_domain::{
    HttpMethod, OperationKind, OperationMetadata, Priority, QueueOperation, Result, SteepleError,
};

/// SQLite-backed operation store.
pub struct SqliteOperationStore {
    db: Arc<DbManager>,
}

impl SqliteOperationStore {
    /// Construct a store backed by the shared database manager.
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    fn insert_row(conn: &DbConnection, op: &QueueOperation) -> Result<()> {
        let payload_json = op
            .payload
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| SteepleError::InvalidInput(format!("payload: {e}")))?;
        let headers_json = serde_json::to_string(&op.headers)
            .map_err(|e| SteepleError::InvalidInput(format!("headers: {e}")))?;
        let metadata_json = op
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| SteepleError::InvalidInput(format!("metadata: {e}")))?;

        conn.execute(
            QUEUE_INSERT_SQL,
            params![
                op.id,
                op.kind.to_string(),
                op.endpoint,
                op.method.to_string(),
                payload_json,
                headers_json,
                op.enqueued_at,
                i64::from(op.retry_count),
                i64::from(op.max_retries),
                i64::from(op.priority.rank()),
                metadata_json,
            ],
        )
        .map_err(map_sql_error)?;
        Ok(())
    }

    fn fetch_rows(conn: &DbConnection) -> Result<Vec<QueueOperation>> {
        let mut stmt = conn.prepare(QUEUE_SELECT_SQL).map_err(map_sql_error)?;
        let rows = stmt
            .query_map([], map_queue_row)
            .map_err(map_sql_error)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(map_sql_error)?;
        Ok(rows)
    }
}

#[async_trait]
impl OperationStore for SqliteOperationStore {
    async fn insert(&self, op: &QueueOperation) -> Result<()> {
        let db = Arc::clone(&self.db);
        let to_insert = op.clone();

        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            Self::insert_row(&conn, &to_insert)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn fetch_all(&self) -> Result<Vec<QueueOperation>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> Result<Vec<QueueOperation>> {
            let conn = db.get_connection()?;
            Self::fetch_rows(&conn)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn remove(&self, id: &str) -> Result<()> {
        let db = Arc::clone(&self.db);
        let id = id.to_string();

        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            conn.execute("DELETE FROM sync_queue WHERE id = ?1", params![id])
                .map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn set_retry_count(&self, id: &str, retry_count: u32) -> Result<()> {
        let db = Arc::clone(&self.db);
        let id = id.to_string();

        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            let updated = conn
                .execute(
                    "UPDATE sync_queue SET retry_count = ?2 WHERE id = ?1",
                    params![id, i64::from(retry_count)],
                )
                .map_err(map_sql_error)?;
            if updated == 0 {
                return Err(SteepleError::NotFound(format!("queue operation {id}")));
            }
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn clear(&self) -> Result<()> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            conn.execute("DELETE FROM sync_queue", []).map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }
}

const QUEUE_INSERT_SQL: &str = "INSERT OR REPLACE INTO sync_queue (
        id, kind, endpoint, method, payload_json, headers_json, enqueued_at,
        retry_count, max_retries, priority_rank, metadata_json
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)";

const QUEUE_SELECT_SQL: &str = "SELECT
        id, kind, endpoint, method, payload_json, headers_json, enqueued_at,
        retry_count, max_retries, priority_rank, metadata_json
    FROM sync_queue
    ORDER BY priority_rank ASC, enqueued_at ASC";

fn map_queue_row(row: &Row<'_>) -> rusqlite::Result<QueueOperation> {
    let id: String = row.get(0)?;
    let kind_raw: String = row.get(1)?;
    let method_raw: String = row.get(3)?;
    let payload_json: Option<String> = row.get(4)?;
    let headers_json: String = row.get(5)?;
    let retry_count: i64 = row.get(7)?;
    let max_retries: i64 = row.get(8)?;
    let priority_rank: i64 = row.get(9)?;
    let metadata_json: Option<String> = row.get(10)?;

    let kind = parse_enum(&id, &kind_raw, OperationKind::Create);
    let method = parse_enum(&id, &method_raw, HttpMethod::Post);

    let payload = payload_json.as_deref().and_then(|raw| parse_json(&id, "payload", raw));
    let headers = parse_json(&id, "headers", &headers_json).unwrap_or_default();
    let metadata: Option<OperationMetadata> =
        metadata_json.as_deref().and_then(|raw| parse_json(&id, "metadata", raw));

    Ok(QueueOperation {
        id,
        kind,
        endpoint: row.get(2)?,
        method,
        payload,
        headers,
        enqueued_at: row.get(6)?,
        retry_count: u32::try_from(retry_count).unwrap_or(0),
        max_retries: u32::try_from(max_retries).unwrap_or(0),
        priority: Priority::from_rank(u8::try_from(priority_rank).unwrap_or(1)),
        metadata,
    })
}

fn parse_enum<T: FromStr>(id: &str, raw: &str, fallback: T) -> T {
    match raw.parse::<T>() {
        Ok(value) => value,
        Err(_) => {
            warn!(operation_id = %id, raw = %raw, "invalid enum value in sync_queue row; using fallback");
            fallback
        }
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(id: &str, field: &str, raw: &str) -> Option<T> {
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(operation_id = %id, field = field, error = %err, "malformed JSON column in sync_queue row");
            None
        }
    }
}
