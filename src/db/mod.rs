//! Database layer for pm-agent.

pub mod assignments;
pub mod context;
pub mod entities;
pub mod problems;
pub mod seed;
pub mod solutions;
pub mod status;
pub mod tasks;

use crate::types::DeleteSummary;
use anyhow::{Result, anyhow};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;
use uuid::Uuid;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Database handle wrapping a SQLite connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create the database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL for concurrent access; a second writer waits up to busy_timeout
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA foreign_keys=ON;
             PRAGMA busy_timeout=5000;",
        )?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.run_migrations()?;

        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;

        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.run_migrations()?;

        Ok(db)
    }

    fn run_migrations(&self) -> Result<()> {
        let mut conn = self.lock()?;
        embedded::migrations::runner().run(&mut *conn)?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("database connection lock poisoned"))
    }

    /// Execute a function with exclusive access to the connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.lock()?;
        f(&conn)
    }

    /// Execute a function with mutable access to the connection (for transactions).
    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut conn = self.lock()?;
        f(&mut conn)
    }

    /// Delete every row in every table.
    pub fn reset_all(&self) -> Result<DeleteSummary> {
        let summary = self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let summary = clear_all(&tx)?;
            tx.commit()?;
            Ok(summary)
        })?;

        info!(?summary, "All data cleared");
        Ok(summary)
    }
}

/// Empty every table on an open connection. Callers own the transaction.
pub(crate) fn clear_all(conn: &Connection) -> Result<DeleteSummary> {
    conn.execute("UPDATE context SET active_task_id = NULL WHERE id = 1", [])?;
    let tasks = conn.execute("DELETE FROM tasks", [])?;
    let solutions = conn.execute("DELETE FROM solutions", [])?;
    let assignments = conn.execute("DELETE FROM entity_problems", [])?;
    let problems = conn.execute("DELETE FROM problems", [])?;
    let entities = conn.execute("DELETE FROM entities", [])?;

    Ok(DeleteSummary {
        entities,
        problems,
        assignments,
        solutions,
        tasks,
        context_cleared: true,
    })
}

/// Get the current timestamp in milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Generate a fresh record id.
pub fn new_id() -> String {
    Uuid::now_v7().to_string()
}

/// Count rows matching a single-parameter query.
fn count(conn: &Connection, sql: &str, param: &str) -> Result<i64> {
    let n: i64 = conn.query_row(sql, [param], |row| row.get(0))?;
    Ok(n)
}

/// Escape `%`, `_` and `\` for use inside a LIKE pattern with `ESCAPE '\'`.
fn like_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    escaped.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("api"), "%api%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }

    #[test]
    fn migrations_create_context_row() {
        let db = Database::open_in_memory().unwrap();
        let rows: i64 = db
            .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM context", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn new_ids_are_unique() {
        assert_ne!(new_id(), new_id());
    }
}
