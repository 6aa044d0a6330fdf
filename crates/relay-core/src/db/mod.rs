//! SQLite database layer for the Relay engine.
//!
//! Uses rusqlite with WAL mode for concurrent read performance.
//! All database operations are executed via `tokio::task::spawn_blocking`
//! to avoid blocking the async runtime.

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::error::ServerError;

/// Thread-safe handle to the SQLite database.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) a SQLite database at the given path.
    pub fn open(db_path: &str) -> Result<Self, ServerError> {
        if db_path == ":memory:" {
            return Self::open_in_memory();
        }

        let path = Path::new(db_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }

        let conn = Connection::open(db_path)
            .map_err(|e| ServerError::Database(format!("Failed to open database: {}", e)))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| ServerError::Database(format!("Failed to set pragmas: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.initialize_tables()?;

        tracing::info!("SQLite database opened at: {}", db_path);
        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, ServerError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| ServerError::Database(format!("Failed to open in-memory db: {}", e)))?;

        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| ServerError::Database(format!("Failed to set pragmas: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.initialize_tables()?;
        Ok(db)
    }

    /// Execute a closure with access to the database connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, ServerError>
    where
        F: FnOnce(&Connection) -> Result<T, rusqlite::Error>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| ServerError::Database(format!("Lock poisoned: {}", e)))?;
        f(&conn).map_err(|e| ServerError::Database(e.to_string()))
    }

    /// Execute a closure with access to the database connection (async-friendly).
    pub async fn with_conn_async<F, T>(&self, f: F) -> Result<T, ServerError>
    where
        F: FnOnce(&Connection) -> Result<T, rusqlite::Error> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || db.with_conn(f))
            .await
            .map_err(|e| ServerError::Database(format!("Task join error: {}", e)))?
    }

    /// Create all tables if they don't exist.
    fn initialize_tables(&self) -> Result<(), ServerError> {
        self.with_conn(|conn| {
            conn.execute_batch(
                "
                CREATE TABLE IF NOT EXISTS automations (
                    id              TEXT PRIMARY KEY,
                    user_id         TEXT NOT NULL,
                    name            TEXT NOT NULL,
                    blueprint       TEXT NOT NULL,
                    status          TEXT NOT NULL DEFAULT 'active',
                    created_at      INTEGER NOT NULL,
                    updated_at      INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_automations_user ON automations(user_id);

                CREATE TABLE IF NOT EXISTS automation_runs (
                    id              TEXT PRIMARY KEY,
                    automation_id   TEXT NOT NULL REFERENCES automations(id) ON DELETE CASCADE,
                    user_id         TEXT NOT NULL,
                    status          TEXT NOT NULL DEFAULT 'running',
                    trigger_data    TEXT NOT NULL DEFAULT 'null',
                    progress        TEXT,
                    result          TEXT,
                    error           TEXT,
                    started_at      INTEGER NOT NULL,
                    completed_at    INTEGER
                );
                CREATE INDEX IF NOT EXISTS idx_runs_automation ON automation_runs(automation_id);

                CREATE TABLE IF NOT EXISTS credentials (
                    id              TEXT PRIMARY KEY,
                    automation_id   TEXT NOT NULL,
                    user_id         TEXT NOT NULL,
                    platform        TEXT NOT NULL,
                    encoded_data    TEXT NOT NULL,
                    is_active       INTEGER NOT NULL DEFAULT 1,
                    created_at      INTEGER NOT NULL,
                    updated_at      INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_credentials_scope ON credentials(automation_id, user_id);

                CREATE TABLE IF NOT EXISTS agents (
                    id              TEXT PRIMARY KEY,
                    user_id         TEXT NOT NULL,
                    name            TEXT NOT NULL,
                    agent_rules     TEXT NOT NULL DEFAULT '',
                    llm_provider    TEXT NOT NULL DEFAULT 'openai',
                    model           TEXT NOT NULL DEFAULT 'gpt-4o-mini',
                    api_key         TEXT NOT NULL DEFAULT '',
                    created_at      INTEGER NOT NULL,
                    updated_at      INTEGER NOT NULL
                );
                "
            )
        })
    }
}
