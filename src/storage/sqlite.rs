//! SQLite storage implementation
//!
//! Each `SqliteStore` owns one connection. Workers in the same or different
//! processes open their own store on the same database file; SQLite's write
//! lock is what serializes their claims.

use crate::state::TaskStatus;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{FrontierStore, StorageError, StorageResult};
use crate::storage::{
    parse_db_time, to_db_time, DocumentRecord, LogEntry, LogEvent, NewTask, TaskRecord,
    TaskUpdate,
};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, TransactionBehavior};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// How long a connection waits for another writer before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

const TASK_COLUMNS: &str =
    "id, url, scope, status, added_at, started_at, retry_at, try_count";

/// Lease one claimable task and return its post-image
const CLAIM_SQL: &str = "
    UPDATE tasks
    SET status = 'inprogress', started_at = ?1, retry_at = NULL
    WHERE id = (
        SELECT id FROM tasks
        WHERE status = 'pending'
           OR (status = 'retry_later' AND retry_at <= ?1)
           OR (status = 'inprogress' AND started_at <= ?2)
        LIMIT 1
    )
    RETURNING id, url, scope, status, added_at, started_at, retry_at, try_count";

/// Move a leased task to a status without touching `try_count`
const FINISH_SQL: &str = "
    UPDATE tasks
    SET status = ?1, retry_at = NULL
    WHERE id = ?2 AND status = 'inprogress' AND started_at = ?3
    RETURNING id, url, scope, status, added_at, started_at, retry_at, try_count";

/// Count a failed attempt on a leased task; SET expressions see the old row
const FAILURE_SQL: &str = "
    UPDATE tasks
    SET try_count = try_count + 1,
        status = CASE WHEN try_count + 1 >= ?1 THEN 'failed' ELSE 'retry_later' END,
        retry_at = CASE WHEN try_count + 1 >= ?1 THEN NULL ELSE ?2 END
    WHERE id = ?3 AND status = 'inprogress' AND started_at = ?4
    RETURNING id, url, scope, status, added_at, started_at, retry_at, try_count";

/// SQLite storage backend
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens or creates the frontier database at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStore)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates a private in-memory database
    ///
    /// Useful for single-worker runs and tests; other connections cannot see it.
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

impl FrontierStore for SqliteStore {
    // ===== Atomic Primitives =====

    fn claim(
        &mut self,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> StorageResult<Option<TaskRecord>> {
        // IMMEDIATE takes the write lock before the selection is read
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let claimed = tx
            .query_row(
                CLAIM_SQL,
                params![to_db_time(&now), to_db_time(&stale_before)],
                row_to_task,
            )
            .optional()?;

        tx.commit()?;
        Ok(claimed)
    }

    fn insert_task_if_absent(&mut self, task: &NewTask) -> StorageResult<bool> {
        let inserted = self.conn.execute(
            "INSERT INTO tasks (url, scope, status, added_at, started_at, retry_at, try_count)
             VALUES (?1, ?2, ?3, ?4, NULL, NULL, 0)
             ON CONFLICT(url, scope) DO NOTHING",
            params![
                task.url,
                task.scope,
                TaskStatus::Pending.to_db_string(),
                to_db_time(&task.added_at)
            ],
        )?;
        Ok(inserted == 1)
    }

    // ===== Task Management =====

    fn update_task(
        &mut self,
        task_id: i64,
        lease_started_at: DateTime<Utc>,
        update: &TaskUpdate,
    ) -> StorageResult<Option<TaskRecord>> {
        let lease = to_db_time(&lease_started_at);

        let updated = match update {
            TaskUpdate::Finish(status) => self
                .conn
                .query_row(
                    FINISH_SQL,
                    params![status.to_db_string(), task_id, lease],
                    row_to_task,
                )
                .optional()?,
            TaskUpdate::Failure {
                retry_at,
                max_tries,
            } => self
                .conn
                .query_row(
                    FAILURE_SQL,
                    params![max_tries, to_db_time(retry_at), task_id, lease],
                    row_to_task,
                )
                .optional()?,
        };

        Ok(updated)
    }

    fn get_task(&self, task_id: i64) -> StorageResult<Option<TaskRecord>> {
        let task = self
            .conn
            .query_row(
                &format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLUMNS),
                params![task_id],
                row_to_task,
            )
            .optional()?;
        Ok(task)
    }

    fn find_task(&self, url: &str, scope: &str) -> StorageResult<Option<TaskRecord>> {
        let task = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM tasks WHERE url = ?1 AND scope = ?2",
                    TASK_COLUMNS
                ),
                params![url, scope],
                row_to_task,
            )
            .optional()?;
        Ok(task)
    }

    fn list_tasks(&self) -> StorageResult<Vec<TaskRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM tasks ORDER BY id", TASK_COLUMNS))?;

        let tasks = stmt
            .query_map([], row_to_task)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(tasks)
    }

    fn count_tasks(&self, statuses: &[TaskStatus]) -> StorageResult<u64> {
        if statuses.is_empty() {
            return Ok(0);
        }

        let placeholders = (1..=statuses.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");

        let count: i64 = self.conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM tasks WHERE status IN ({})",
                placeholders
            ),
            params_from_iter(statuses.iter().map(|s| s.to_db_string())),
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_tasks_by_status(&self) -> StorageResult<BTreeMap<TaskStatus, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT status, COUNT(*) FROM tasks GROUP BY status")?;

        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = BTreeMap::new();
        for row in rows {
            let (status_str, count) = row?;
            match TaskStatus::from_db_string(&status_str) {
                Some(status) => {
                    counts.insert(status, count as u64);
                }
                None => tracing::warn!("Ignoring unknown task status '{}'", status_str),
            }
        }

        Ok(counts)
    }

    // ===== Documents =====

    fn insert_document(&mut self, document: &DocumentRecord) -> StorageResult<bool> {
        let emphasis_json = serde_json::to_string(&document.emphasis)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        let inserted = self.conn.execute(
            "INSERT INTO documents
             (task_id, url, scope, fetched_at, status_code, content_size, html, title, emphasis_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(task_id) DO NOTHING",
            params![
                document.task_id,
                document.url,
                document.scope,
                to_db_time(&document.fetched_at),
                document.status_code,
                document.content_size as i64,
                document.html,
                document.title,
                emphasis_json,
            ],
        )?;
        Ok(inserted == 1)
    }

    fn count_documents(&self, scope: &str) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE scope = ?1",
            params![scope],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_documents_by_scope(&self) -> StorageResult<BTreeMap<String, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT scope, COUNT(*) FROM documents GROUP BY scope")?;

        let counts = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        Ok(counts)
    }

    // ===== Audit Trail =====

    fn append_log(&mut self, entry: &LogEntry) -> StorageResult<()> {
        let details_json = serde_json::to_string(&entry.details)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        self.conn.execute(
            "INSERT INTO logs (logged_at, event, message, url, scope, details_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                to_db_time(&entry.logged_at),
                entry.event.to_db_string(),
                entry.message,
                entry.url,
                entry.scope,
                details_json,
            ],
        )?;
        Ok(())
    }

    fn list_logs(&self) -> StorageResult<Vec<LogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT logged_at, event, message, url, scope, details_json FROM logs ORDER BY id",
        )?;

        let entries = stmt
            .query_map([], |row| {
                let event: String = row.get(1)?;
                let details: String = row.get(5)?;
                Ok(LogEntry {
                    logged_at: time_column(row, 0)?,
                    event: LogEvent::from_db_string(&event).ok_or_else(|| {
                        conversion_error(1, format!("unknown log event '{}'", event))
                    })?,
                    message: row.get(2)?,
                    url: row.get(3)?,
                    scope: row.get(4)?,
                    details: serde_json::from_str(&details).map_err(|e| conversion_error(5, e))?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    // ===== Maintenance =====

    fn reset(&mut self) -> StorageResult<()> {
        self.conn.execute_batch(
            "
            BEGIN IMMEDIATE;
            DELETE FROM documents;
            DELETE FROM logs;
            DELETE FROM tasks;
            COMMIT;
        ",
        )?;
        Ok(())
    }
}

fn row_to_task(row: &Row<'_>) -> rusqlite::Result<TaskRecord> {
    let status: String = row.get(3)?;
    Ok(TaskRecord {
        id: row.get(0)?,
        url: row.get(1)?,
        scope: row.get(2)?,
        status: TaskStatus::from_db_string(&status)
            .ok_or_else(|| conversion_error(3, format!("unknown task status '{}'", status)))?,
        added_at: time_column(row, 4)?,
        started_at: optional_time_column(row, 5)?,
        retry_at: optional_time_column(row, 6)?,
        try_count: row.get(7)?,
    })
}

fn time_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_db_time(&raw).map_err(|e| conversion_error(idx, e))
}

fn optional_time_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| parse_db_time(&s).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

fn conversion_error(
    idx: usize,
    err: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, err.into())
}
