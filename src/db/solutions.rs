//! Solution CRUD.

use super::problems::require_problem;
use super::tasks::{delete_task_forest, solution_task_forest};
use super::{Database, count, new_id, now_ms};
use crate::config::DeletePolicy;
use crate::error::{CommandError, RecordKind};
use crate::types::{DeleteSummary, SOLUTION_DEFAULT_STATE, Solution, SolutionDetail, SolutionPatch};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::{debug, info};

pub fn parse_solution_row(row: &Row) -> rusqlite::Result<Solution> {
    Ok(Solution {
        id: row.get("id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        problem_id: row.get("problem_id")?,
        state: row.get("state")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

pub(crate) fn get_solution_internal(conn: &Connection, solution_id: &str) -> Result<Option<Solution>> {
    let solution = conn
        .query_row(
            "SELECT * FROM solutions WHERE id = ?1",
            params![solution_id],
            parse_solution_row,
        )
        .optional()?;
    Ok(solution)
}

pub(crate) fn require_solution(conn: &Connection, solution_id: &str) -> Result<Solution> {
    get_solution_internal(conn, solution_id)?
        .ok_or_else(|| CommandError::not_found(RecordKind::Solution, solution_id).into())
}

impl Database {
    /// Propose a solution for an existing problem.
    pub fn add_solution(
        &self,
        title: &str,
        problem_id: &str,
        description: Option<&str>,
    ) -> Result<Solution> {
        if title.trim().is_empty() {
            return Err(CommandError::missing_field("title").into());
        }

        let id = new_id();
        let now = now_ms();

        self.with_conn(|conn| {
            require_problem(conn, problem_id)?;

            conn.execute(
                "INSERT INTO solutions (id, title, description, problem_id, state, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![id, title, description, problem_id, SOLUTION_DEFAULT_STATE, now, now],
            )?;

            debug!(solution_id = %id, problem_id, "Created solution");

            Ok(Solution {
                id,
                title: title.to_string(),
                description: description.map(str::to_string),
                problem_id: problem_id.to_string(),
                state: SOLUTION_DEFAULT_STATE.to_string(),
                created_at: now,
                updated_at: now,
            })
        })
    }

    /// Get a solution with its problem and task forest.
    pub fn get_solution(&self, solution_id: &str) -> Result<Option<SolutionDetail>> {
        self.with_conn(|conn| {
            let Some(solution) = get_solution_internal(conn, solution_id)? else {
                return Ok(None);
            };
            let problem = require_problem(conn, &solution.problem_id)?;
            let tasks = solution_task_forest(conn, &solution.id)?;
            Ok(Some(SolutionDetail {
                solution,
                problem,
                tasks,
            }))
        })
    }

    /// List solutions, optionally only those for one problem.
    pub fn list_solutions(&self, problem_id: Option<&str>) -> Result<Vec<Solution>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM solutions
                 WHERE (?1 IS NULL OR problem_id = ?1)
                 ORDER BY created_at",
            )?;
            let solutions = stmt
                .query_map(params![problem_id], parse_solution_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(solutions)
        })
    }

    /// Update a solution. Solution state is free text.
    pub fn update_solution(&self, solution_id: &str, patch: SolutionPatch) -> Result<Solution> {
        if patch.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(CommandError::invalid_value("title", "title must not be empty").into());
        }
        if patch.state.as_deref().is_some_and(|s| s.trim().is_empty()) {
            return Err(CommandError::invalid_value("state", "state must not be empty").into());
        }

        let now = now_ms();

        self.with_conn(|conn| {
            let solution = require_solution(conn, solution_id)?;

            let updated = Solution {
                title: patch.title.unwrap_or(solution.title),
                description: patch.description.or(solution.description),
                state: patch.state.unwrap_or(solution.state),
                updated_at: now,
                ..solution
            };

            conn.execute(
                "UPDATE solutions SET title = ?1, description = ?2, state = ?3, updated_at = ?4
                 WHERE id = ?5",
                params![updated.title, updated.description, updated.state, now, solution_id],
            )?;

            debug!(solution_id, "Updated solution");
            Ok(updated)
        })
    }

    /// Delete a solution.
    ///
    /// Tasks linked to the solution block the delete under
    /// [`DeletePolicy::Restrict`]; under [`DeletePolicy::Cascade`] they are
    /// removed along with their subtasks.
    pub fn delete_solution(&self, solution_id: &str, policy: DeletePolicy) -> Result<DeleteSummary> {
        let summary = self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            require_solution(&tx, solution_id)?;

            let linked = count(
                &tx,
                "SELECT COUNT(*) FROM tasks WHERE solution_id = ?1",
                solution_id,
            )?;
            if linked > 0 && policy == DeletePolicy::Restrict {
                return Err(CommandError::has_dependents(
                    RecordKind::Solution,
                    solution_id,
                    "tasks",
                    linked,
                )
                .into());
            }

            let (tasks, context_cleared) = delete_task_forest(
                &tx,
                "SELECT id FROM tasks WHERE solution_id = ?1",
                solution_id,
            )?;
            let solutions = tx.execute("DELETE FROM solutions WHERE id = ?1", params![solution_id])?;

            tx.commit()?;

            Ok(DeleteSummary {
                solutions,
                tasks,
                context_cleared,
                ..Default::default()
            })
        })?;

        info!(solution_id, %policy, ?summary, "Deleted solution");
        Ok(summary)
    }
}
