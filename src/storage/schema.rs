//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the frontier database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per (url, scope) pair
CREATE TABLE IF NOT EXISTS tasks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL,
    scope TEXT NOT NULL,
    status TEXT NOT NULL,
    added_at TEXT NOT NULL,
    started_at TEXT,
    retry_at TEXT,
    try_count INTEGER NOT NULL DEFAULT 0,
    UNIQUE(url, scope)
);

CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);

-- Fetched pages, at most one per task
CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    task_id INTEGER NOT NULL UNIQUE REFERENCES tasks(id),
    url TEXT NOT NULL,
    scope TEXT NOT NULL,
    fetched_at TEXT NOT NULL,
    status_code INTEGER NOT NULL,
    content_size INTEGER NOT NULL,
    html TEXT NOT NULL,
    title TEXT NOT NULL,
    emphasis_json TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_documents_scope ON documents(scope);
CREATE INDEX IF NOT EXISTS idx_documents_url_scope ON documents(url, scope, fetched_at);

-- Append-only audit trail
CREATE TABLE IF NOT EXISTS logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    logged_at TEXT NOT NULL,
    event TEXT NOT NULL,
    message TEXT NOT NULL,
    url TEXT NOT NULL,
    scope TEXT NOT NULL,
    details_json TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_logs_logged_at ON logs(logged_at);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
