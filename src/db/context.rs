//! The active-task pointer.

use super::Database;
use super::entities::get_entity_internal;
use super::problems::get_problem_internal;
use super::solutions::get_solution_internal;
use super::tasks::{get_task_internal, require_task};
use crate::types::Context;
use anyhow::Result;
use rusqlite::{Connection, params};
use tracing::info;

pub(crate) fn get_context_internal(conn: &Connection) -> Result<Context> {
    let active_id: Option<String> = conn.query_row(
        "SELECT active_task_id FROM context WHERE id = 1",
        [],
        |row| row.get(0),
    )?;

    let active_task = match active_id.as_deref() {
        Some(id) => get_task_internal(conn, id)?,
        None => None,
    };
    let solution = match active_task.as_ref().and_then(|t| t.solution_id.as_deref()) {
        Some(sid) => get_solution_internal(conn, sid)?,
        None => None,
    };
    let problem = match solution.as_ref() {
        Some(s) => get_problem_internal(conn, &s.problem_id)?,
        None => None,
    };
    let entity = match active_task.as_ref().and_then(|t| t.entity_id.as_deref()) {
        Some(eid) => get_entity_internal(conn, eid)?,
        None => None,
    };

    Ok(Context {
        active_task,
        solution,
        problem,
        entity,
    })
}

impl Database {
    /// The active task with its solution, problem and entity.
    pub fn get_context(&self) -> Result<Context> {
        self.with_conn(get_context_internal)
    }

    /// Make `task_id` the active task, replacing any previous one.
    pub fn set_active_task(&self, task_id: &str) -> Result<Context> {
        self.with_conn(|conn| {
            require_task(conn, task_id)?;
            conn.execute(
                "UPDATE context SET active_task_id = ?1 WHERE id = 1",
                params![task_id],
            )?;
            info!(task_id, "Active task set");
            get_context_internal(conn)
        })
    }

    /// Clear the active task. Clearing an empty context is not an error.
    pub fn clear_active_task(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("UPDATE context SET active_task_id = NULL WHERE id = 1", [])?;
            info!("Active task cleared");
            Ok(())
        })
    }
}
