//! Entity-problem assignment links.

use super::entities::require_entity;
use super::problems::require_problem;
use super::{Database, new_id, now_ms};
use crate::error::{CommandError, RecordKind};
use crate::types::Assignment;
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

/// Link a problem to an entity on an existing connection.
pub(crate) fn insert_assignment(
    conn: &Connection,
    problem_id: &str,
    entity_id: &str,
) -> Result<Assignment> {
    require_problem(conn, problem_id)?;
    require_entity(conn, entity_id)?;

    let existing = conn
        .query_row(
            "SELECT id FROM entity_problems WHERE entity_id = ?1 AND problem_id = ?2",
            params![entity_id, problem_id],
            |row| row.get::<_, String>(0),
        )
        .optional()?;
    if existing.is_some() {
        return Err(CommandError::already_exists(
            RecordKind::Assignment,
            format!("Problem {} is already assigned to entity {}", problem_id, entity_id),
        )
        .into());
    }

    let assignment = Assignment {
        id: new_id(),
        entity_id: entity_id.to_string(),
        problem_id: problem_id.to_string(),
        created_at: now_ms(),
    };
    conn.execute(
        "INSERT INTO entity_problems (id, entity_id, problem_id, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            assignment.id,
            assignment.entity_id,
            assignment.problem_id,
            assignment.created_at
        ],
    )?;

    debug!(problem_id, entity_id, "Assigned problem");
    Ok(assignment)
}

impl Database {
    /// Assign a problem to an entity. Each pair can be linked once.
    pub fn assign_problem(&self, problem_id: &str, entity_id: &str) -> Result<Assignment> {
        self.with_conn(|conn| insert_assignment(conn, problem_id, entity_id))
    }

    /// Remove the link between a problem and an entity.
    pub fn unassign_problem(&self, problem_id: &str, entity_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM entity_problems WHERE problem_id = ?1 AND entity_id = ?2",
                params![problem_id, entity_id],
            )?;
            if removed == 0 {
                return Err(CommandError::not_found(
                    RecordKind::Assignment,
                    &format!("{}/{}", problem_id, entity_id),
                )
                .into());
            }
            debug!(problem_id, entity_id, "Unassigned problem");
            Ok(())
        })
    }
}
