//! Problem CRUD and lifecycle transitions.

use super::entities::parse_entity_row;
use super::tasks::delete_task_forest;
use super::{Database, count, like_pattern, new_id, now_ms};
use crate::config::DeletePolicy;
use crate::error::{CommandError, RecordKind};
use crate::lifecycle::{self, ProblemState};
use crate::types::{DeleteSummary, NewProblem, Problem, ProblemDetail, ProblemPatch};
use anyhow::Result;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};
use tracing::{debug, info};

pub fn parse_problem_row(row: &Row) -> rusqlite::Result<Problem> {
    let state: String = row.get("state")?;
    let state = state.parse::<ProblemState>().map_err(|e| {
        let idx = row.as_ref().column_index("state").unwrap_or(0);
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
    })?;

    Ok(Problem {
        id: row.get("id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        impact: row.get("impact")?,
        opportunity: row.get("opportunity")?,
        state,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

/// Internal helper to get a problem using an existing connection (avoids deadlock).
pub(crate) fn get_problem_internal(conn: &Connection, problem_id: &str) -> Result<Option<Problem>> {
    let problem = conn
        .query_row(
            "SELECT * FROM problems WHERE id = ?1",
            params![problem_id],
            parse_problem_row,
        )
        .optional()?;
    Ok(problem)
}

pub(crate) fn require_problem(conn: &Connection, problem_id: &str) -> Result<Problem> {
    get_problem_internal(conn, problem_id)?
        .ok_or_else(|| CommandError::not_found(RecordKind::Problem, problem_id).into())
}

/// Attach assigned entities to a problem.
fn with_entities(conn: &Connection, problem: Problem) -> Result<ProblemDetail> {
    let mut stmt = conn.prepare(
        "SELECT e.* FROM entities e
         INNER JOIN entity_problems ep ON ep.entity_id = e.id
         WHERE ep.problem_id = ?1
         ORDER BY ep.created_at",
    )?;
    let entities = stmt
        .query_map(params![problem.id], parse_entity_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ProblemDetail { problem, entities })
}

fn details(conn: &Connection, problems: Vec<Problem>) -> Result<Vec<ProblemDetail>> {
    problems
        .into_iter()
        .map(|p| with_entities(conn, p))
        .collect()
}

/// Insert a problem on an existing connection.
pub(crate) fn insert_problem(conn: &Connection, input: NewProblem) -> Result<Problem> {
    if input.title.trim().is_empty() {
        return Err(CommandError::missing_field("title").into());
    }

    let now = now_ms();
    let problem = Problem {
        id: new_id(),
        title: input.title,
        description: input.description,
        impact: input.impact,
        opportunity: input.opportunity,
        state: ProblemState::INITIAL,
        created_at: now,
        updated_at: now,
    };

    conn.execute(
        "INSERT INTO problems (id, title, description, impact, opportunity, state, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            problem.id,
            problem.title,
            problem.description,
            problem.impact,
            problem.opportunity,
            problem.state.as_str(),
            problem.created_at,
            problem.updated_at,
        ],
    )?;

    debug!(problem_id = %problem.id, "Created problem");
    Ok(problem)
}

/// Validate and write one lifecycle event. Returns the state the problem
/// left and the refreshed problem. Must run inside a transaction.
pub(crate) fn apply_transition(
    conn: &Connection,
    problem_id: &str,
    event: &str,
) -> Result<(ProblemState, ProblemDetail)> {
    let problem = require_problem(conn, problem_id)?;
    let from = problem.state;

    let to = match lifecycle::transition(from, event) {
        Ok(to) => to,
        Err(rejected) => {
            debug!(problem_id, event, state = %from, "Rejected problem transition");
            return Err(rejected.into());
        }
    };

    let changed = conn.execute(
        "UPDATE problems SET state = ?1, updated_at = ?2 WHERE id = ?3 AND state = ?4",
        params![to.as_str(), now_ms(), problem_id, from.as_str()],
    )?;
    if changed != 1 {
        return Err(CommandError::database(format!(
            "Problem {} was modified concurrently; state is no longer \"{}\"",
            problem_id, from
        ))
        .into());
    }

    let refreshed = require_problem(conn, problem_id)?;
    Ok((from, with_entities(conn, refreshed)?))
}

impl Database {
    /// Create a problem in the initial lifecycle state.
    pub fn add_problem(&self, input: NewProblem) -> Result<Problem> {
        self.with_conn(|conn| insert_problem(conn, input))
    }

    /// Get a problem with its assigned entities.
    pub fn get_problem(&self, problem_id: &str) -> Result<Option<ProblemDetail>> {
        self.with_conn(|conn| {
            get_problem_internal(conn, problem_id)?
                .map(|p| with_entities(conn, p))
                .transpose()
        })
    }

    /// List problems, optionally only those in `state`.
    pub fn list_problems(&self, state: Option<ProblemState>) -> Result<Vec<ProblemDetail>> {
        self.with_conn(|conn| {
            let problems = match state {
                Some(state) => {
                    let mut stmt = conn.prepare(
                        "SELECT * FROM problems WHERE state = ?1 ORDER BY created_at",
                    )?;
                    stmt.query_map(params![state.as_str()], parse_problem_row)?
                        .collect::<Result<Vec<_>, _>>()?
                }
                None => {
                    let mut stmt = conn.prepare("SELECT * FROM problems ORDER BY created_at")?;
                    stmt.query_map([], parse_problem_row)?
                        .collect::<Result<Vec<_>, _>>()?
                }
            };
            details(conn, problems)
        })
    }

    /// Case-insensitive substring search on problem titles.
    pub fn find_problems(&self, query: &str) -> Result<Vec<ProblemDetail>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM problems WHERE title LIKE ?1 ESCAPE '\\' ORDER BY created_at",
            )?;
            let problems = stmt
                .query_map(params![like_pattern(query)], parse_problem_row)?
                .collect::<Result<Vec<_>, _>>()?;
            details(conn, problems)
        })
    }

    /// Update a problem's text fields. Never touches `state`.
    pub fn update_problem(&self, problem_id: &str, patch: ProblemPatch) -> Result<ProblemDetail> {
        if patch.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(CommandError::invalid_value("title", "title must not be empty").into());
        }

        let now = now_ms();

        self.with_conn(|conn| {
            let problem = require_problem(conn, problem_id)?;

            let updated = Problem {
                title: patch.title.unwrap_or(problem.title),
                description: patch.description.or(problem.description),
                impact: patch.impact.or(problem.impact),
                opportunity: patch.opportunity.or(problem.opportunity),
                updated_at: now,
                ..problem
            };

            conn.execute(
                "UPDATE problems
                 SET title = ?1, description = ?2, impact = ?3, opportunity = ?4, updated_at = ?5
                 WHERE id = ?6",
                params![
                    updated.title,
                    updated.description,
                    updated.impact,
                    updated.opportunity,
                    now,
                    problem_id,
                ],
            )?;

            debug!(problem_id, "Updated problem");
            with_entities(conn, updated)
        })
    }

    /// Apply a lifecycle event to a problem.
    ///
    /// The read of the current state, the validation and the write run in a
    /// single IMMEDIATE transaction, so a concurrent transition on the same
    /// problem either waits for this one to commit or fails. The UPDATE is
    /// also conditioned on the state that was read.
    pub fn transition_problem(&self, problem_id: &str, event: &str) -> Result<ProblemDetail> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let (from, detail) = apply_transition(&tx, problem_id, event)?;
            tx.commit()?;

            info!(problem_id, event, from = %from, to = %detail.problem.state, "Problem transitioned");
            Ok(detail)
        })
    }

    /// Delete a problem.
    ///
    /// Solutions block the delete under [`DeletePolicy::Restrict`]; under
    /// [`DeletePolicy::Cascade`] they are removed along with their tasks.
    /// Entity assignments are always removed.
    pub fn delete_problem(&self, problem_id: &str, policy: DeletePolicy) -> Result<DeleteSummary> {
        let summary = self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            require_problem(&tx, problem_id)?;

            let solutions = count(
                &tx,
                "SELECT COUNT(*) FROM solutions WHERE problem_id = ?1",
                problem_id,
            )?;
            if solutions > 0 && policy == DeletePolicy::Restrict {
                return Err(CommandError::has_dependents(
                    RecordKind::Problem,
                    problem_id,
                    "solutions",
                    solutions,
                )
                .into());
            }

            let (tasks, context_cleared) = delete_task_forest(
                &tx,
                "SELECT t.id FROM tasks t
                 INNER JOIN solutions s ON t.solution_id = s.id
                 WHERE s.problem_id = ?1",
                problem_id,
            )?;
            let solutions = tx.execute(
                "DELETE FROM solutions WHERE problem_id = ?1",
                params![problem_id],
            )?;
            let assignments = tx.execute(
                "DELETE FROM entity_problems WHERE problem_id = ?1",
                params![problem_id],
            )?;
            let problems = tx.execute("DELETE FROM problems WHERE id = ?1", params![problem_id])?;

            tx.commit()?;

            Ok(DeleteSummary {
                problems,
                assignments,
                solutions,
                tasks,
                context_cleared,
                ..Default::default()
            })
        })?;

        info!(problem_id, %policy, ?summary, "Deleted problem");
        Ok(summary)
    }
}
