//! Task CRUD and tree operations.

use super::entities::require_entity;
use super::solutions::require_solution;
use super::{Database, count, new_id, now_ms};
use crate::config::DeletePolicy;
use crate::error::{CommandError, RecordKind};
use crate::types::{DeleteSummary, NewTask, Task, TaskFilter, TaskPatch, TaskTree, TASK_DEFAULT_STATE};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::collections::HashMap;
use tracing::{debug, info};

/// Sibling order: explicit position first, then creation time.
const TASK_ORDER: &str = "position, created_at";

pub fn parse_task_row(row: &Row) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get("id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        solution_id: row.get("solution_id")?,
        parent_id: row.get("parent_id")?,
        entity_id: row.get("entity_id")?,
        state: row.get("state")?,
        position: row.get("position")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

/// Internal helper to get a task using an existing connection (avoids deadlock).
pub(crate) fn get_task_internal(conn: &Connection, task_id: &str) -> Result<Option<Task>> {
    let task = conn
        .query_row(
            "SELECT * FROM tasks WHERE id = ?1",
            params![task_id],
            parse_task_row,
        )
        .optional()?;
    Ok(task)
}

pub(crate) fn require_task(conn: &Connection, task_id: &str) -> Result<Task> {
    get_task_internal(conn, task_id)?
        .ok_or_else(|| CommandError::not_found(RecordKind::Task, task_id).into())
}

/// Get the descendants of `task_id` as a forest, ordered by position.
pub(crate) fn get_children_recursive(conn: &Connection, task_id: &str) -> Result<Vec<TaskTree>> {
    let mut stmt = conn.prepare(&format!(
        "WITH RECURSIVE subtree(id) AS (
            SELECT id FROM tasks WHERE parent_id = ?1
            UNION
            SELECT t.id FROM tasks t JOIN subtree s ON t.parent_id = s.id
        )
        SELECT * FROM tasks WHERE id IN (SELECT id FROM subtree) ORDER BY {TASK_ORDER}"
    ))?;
    let descendants = stmt
        .query_map(params![task_id], parse_task_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(build_forest(descendants, Some(task_id)))
}

/// Build the task forest for a solution: its tasks plus all their descendants.
pub(crate) fn solution_task_forest(conn: &Connection, solution_id: &str) -> Result<Vec<TaskTree>> {
    let mut stmt = conn.prepare(&format!(
        "WITH RECURSIVE forest(id) AS (
            SELECT id FROM tasks WHERE solution_id = ?1
            UNION
            SELECT t.id FROM tasks t JOIN forest f ON t.parent_id = f.id
        )
        SELECT * FROM tasks WHERE id IN (SELECT id FROM forest) ORDER BY {TASK_ORDER}"
    ))?;
    let tasks = stmt
        .query_map(params![solution_id], parse_task_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(build_roots(tasks))
}

/// Nest a flat, ordered list of tasks under `root_parent`.
fn build_forest(tasks: Vec<Task>, root_parent: Option<&str>) -> Vec<TaskTree> {
    let mut by_parent: HashMap<Option<String>, Vec<Task>> = HashMap::new();
    for task in tasks {
        by_parent.entry(task.parent_id.clone()).or_default().push(task);
    }
    attach(&mut by_parent, root_parent.map(str::to_string))
}

/// Nest a flat list where any task whose parent is not in the list is a root.
fn build_roots(tasks: Vec<Task>) -> Vec<TaskTree> {
    let ids: std::collections::HashSet<String> = tasks.iter().map(|t| t.id.clone()).collect();
    let mut by_parent: HashMap<Option<String>, Vec<Task>> = HashMap::new();
    let mut roots = Vec::new();
    for task in tasks {
        match task.parent_id.as_ref() {
            Some(pid) if ids.contains(pid) => by_parent.entry(Some(pid.clone())).or_default().push(task),
            _ => roots.push(task),
        }
    }
    roots
        .into_iter()
        .map(|task| {
            let children = attach(&mut by_parent, Some(task.id.clone()));
            TaskTree { task, children }
        })
        .collect()
}

fn attach(by_parent: &mut HashMap<Option<String>, Vec<Task>>, parent: Option<String>) -> Vec<TaskTree> {
    by_parent
        .remove(&parent)
        .unwrap_or_default()
        .into_iter()
        .map(|task| {
            let children = attach(by_parent, Some(task.id.clone()));
            TaskTree { task, children }
        })
        .collect()
}

/// Delete the tasks selected by `seed_sql` (bound to `?1`) and all their
/// descendants. Clears the context if the active task is among them.
///
/// Returns the number of tasks deleted and whether the context was cleared.
pub(crate) fn delete_task_forest(conn: &Connection, seed_sql: &str, param: &str) -> Result<(usize, bool)> {
    let doomed = format!(
        "WITH RECURSIVE doomed(id) AS (
            {seed_sql}
            UNION
            SELECT t.id FROM tasks t JOIN doomed d ON t.parent_id = d.id
        )"
    );

    let cleared = conn.execute(
        &format!(
            "{doomed}
             UPDATE context SET active_task_id = NULL
             WHERE active_task_id IN (SELECT id FROM doomed)"
        ),
        params![param],
    )?;
    let deleted = conn.execute(
        &format!("{doomed} DELETE FROM tasks WHERE id IN (SELECT id FROM doomed)"),
        params![param],
    )?;

    Ok((deleted, cleared > 0))
}

/// Whether `candidate` is `task_id` or one of its ancestors.
fn is_ancestor_or_self(conn: &Connection, candidate: &str, task_id: &str) -> Result<bool> {
    let found: i64 = conn.query_row(
        "WITH RECURSIVE ancestors(id) AS (
            SELECT ?1
            UNION
            SELECT t.parent_id FROM tasks t JOIN ancestors a ON t.id = a.id
            WHERE t.parent_id IS NOT NULL
        )
        SELECT COUNT(*) FROM ancestors WHERE id = ?2",
        params![task_id, candidate],
        |row| row.get(0),
    )?;
    Ok(found > 0)
}

impl Database {
    /// Create a task.
    ///
    /// A child task without an explicit solution inherits its parent's
    /// solution. Without an explicit position the task is appended after its
    /// last sibling.
    pub fn add_task(&self, input: NewTask) -> Result<Task> {
        if input.title.trim().is_empty() {
            return Err(CommandError::missing_field("title").into());
        }

        let id = new_id();
        let now = now_ms();

        let task = self.with_conn(|conn| {
            let mut solution_id = input.solution_id.clone();
            if let Some(sid) = solution_id.as_deref() {
                require_solution(conn, sid)?;
            }
            if let Some(pid) = input.parent_id.as_deref() {
                let parent = require_task(conn, pid)?;
                if solution_id.is_none() {
                    solution_id = parent.solution_id;
                }
            }
            if let Some(eid) = input.entity_id.as_deref() {
                require_entity(conn, eid)?;
            }

            let position = match input.position {
                Some(p) => p,
                None => conn.query_row(
                    "SELECT COALESCE(MAX(position) + 1, 0) FROM tasks
                     WHERE parent_id IS ?1 AND solution_id IS ?2",
                    params![input.parent_id, solution_id],
                    |row| row.get(0),
                )?,
            };

            conn.execute(
                "INSERT INTO tasks (
                    id, title, description, solution_id, parent_id, entity_id,
                    state, position, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    id,
                    input.title,
                    input.description,
                    solution_id,
                    input.parent_id,
                    input.entity_id,
                    TASK_DEFAULT_STATE,
                    position,
                    now,
                    now,
                ],
            )?;

            Ok(Task {
                id: id.clone(),
                title: input.title,
                description: input.description,
                solution_id,
                parent_id: input.parent_id,
                entity_id: input.entity_id,
                state: TASK_DEFAULT_STATE.to_string(),
                position,
                created_at: now,
                updated_at: now,
            })
        })?;

        debug!(task_id = %task.id, "Created task");
        Ok(task)
    }

    /// Get a task by ID.
    pub fn get_task(&self, task_id: &str) -> Result<Option<Task>> {
        self.with_conn(|conn| get_task_internal(conn, task_id))
    }

    /// Get a task with all its children (tree).
    pub fn get_task_tree(&self, task_id: &str) -> Result<Option<TaskTree>> {
        self.with_conn(|conn| match get_task_internal(conn, task_id)? {
            None => Ok(None),
            Some(task) => {
                let children = get_children_recursive(conn, &task.id)?;
                Ok(Some(TaskTree { task, children }))
            }
        })
    }

    /// List tasks matching every filter that is set.
    pub fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT * FROM tasks
                 WHERE (?1 IS NULL OR solution_id = ?1)
                   AND (?2 IS NULL OR parent_id = ?2)
                   AND (?3 IS NULL OR state = ?3)
                 ORDER BY {TASK_ORDER}"
            ))?;
            let tasks = stmt
                .query_map(
                    params![filter.solution_id, filter.parent_id, filter.state],
                    parse_task_row,
                )?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(tasks)
        })
    }

    /// Task forest: all root tasks, or the tasks of one solution.
    pub fn task_tree(&self, solution_id: Option<&str>) -> Result<Vec<TaskTree>> {
        self.with_conn(|conn| match solution_id {
            Some(sid) => {
                require_solution(conn, sid)?;
                solution_task_forest(conn, sid)
            }
            None => {
                let mut stmt = conn.prepare(&format!("SELECT * FROM tasks ORDER BY {TASK_ORDER}"))?;
                let tasks = stmt
                    .query_map([], parse_task_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(build_forest(tasks, None))
            }
        })
    }

    /// Update a task. Unset fields keep their value.
    pub fn update_task(&self, task_id: &str, patch: TaskPatch) -> Result<Task> {
        if patch.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(CommandError::invalid_value("title", "title must not be empty").into());
        }
        if patch.state.as_deref().is_some_and(|s| s.trim().is_empty()) {
            return Err(CommandError::invalid_value("state", "state must not be empty").into());
        }

        let now = now_ms();

        self.with_conn(|conn| {
            let task = require_task(conn, task_id)?;
            if let Some(eid) = patch.entity_id.as_deref() {
                require_entity(conn, eid)?;
            }

            let updated = Task {
                title: patch.title.unwrap_or(task.title),
                description: patch.description.or(task.description),
                state: patch.state.unwrap_or(task.state),
                entity_id: patch.entity_id.or(task.entity_id),
                position: patch.position.unwrap_or(task.position),
                updated_at: now,
                ..task
            };

            conn.execute(
                "UPDATE tasks
                 SET title = ?1, description = ?2, state = ?3, entity_id = ?4, position = ?5, updated_at = ?6
                 WHERE id = ?7",
                params![
                    updated.title,
                    updated.description,
                    updated.state,
                    updated.entity_id,
                    updated.position,
                    now,
                    task_id,
                ],
            )?;

            debug!(task_id, "Updated task");
            Ok(updated)
        })
    }

    /// Move a task under a new parent (or to the top level with `None`).
    ///
    /// Moving a task under itself or one of its descendants is rejected.
    pub fn move_task(&self, task_id: &str, new_parent: Option<&str>) -> Result<Task> {
        let now = now_ms();

        self.with_conn(|conn| {
            let task = require_task(conn, task_id)?;
            if let Some(pid) = new_parent {
                require_task(conn, pid)?;
                if is_ancestor_or_self(conn, task_id, pid)? {
                    return Err(CommandError::invalid_value(
                        "parent",
                        format!("Moving task {} under {} would create a cycle", task_id, pid),
                    )
                    .into());
                }
            }

            conn.execute(
                "UPDATE tasks SET parent_id = ?1, updated_at = ?2 WHERE id = ?3",
                params![new_parent, now, task_id],
            )?;

            debug!(task_id, parent_id = ?new_parent, "Moved task");
            Ok(Task {
                parent_id: new_parent.map(str::to_string),
                updated_at: now,
                ..task
            })
        })
    }

    /// Delete a task.
    ///
    /// Child tasks block the delete under [`DeletePolicy::Restrict`] and are
    /// removed with it under [`DeletePolicy::Cascade`].
    pub fn delete_task(&self, task_id: &str, policy: DeletePolicy) -> Result<DeleteSummary> {
        let summary = self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            require_task(&tx, task_id)?;

            let children = count(&tx, "SELECT COUNT(*) FROM tasks WHERE parent_id = ?1", task_id)?;
            if children > 0 && policy == DeletePolicy::Restrict {
                return Err(CommandError::has_dependents(
                    RecordKind::Task,
                    task_id,
                    "child tasks",
                    children,
                )
                .into());
            }

            let (tasks, context_cleared) =
                delete_task_forest(&tx, "SELECT id FROM tasks WHERE id = ?1", task_id)?;

            tx.commit()?;

            Ok(DeleteSummary {
                tasks,
                context_cleared,
                ..Default::default()
            })
        })?;

        info!(task_id, %policy, ?summary, "Deleted task");
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, parent: Option<&str>) -> Task {
        Task {
            id: id.to_string(),
            title: id.to_string(),
            description: None,
            solution_id: None,
            parent_id: parent.map(str::to_string),
            entity_id: None,
            state: TASK_DEFAULT_STATE.to_string(),
            position: 0,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn build_roots_treats_outside_parents_as_roots() {
        let forest = build_roots(vec![
            task("a", Some("elsewhere")),
            task("b", None),
            task("a1", Some("a")),
        ]);

        assert_eq!(forest.len(), 2);
        assert_eq!(forest[0].task.id, "a");
        assert_eq!(forest[0].children[0].task.id, "a1");
        assert_eq!(forest[1].task.id, "b");
    }

    #[test]
    fn build_forest_keeps_input_order() {
        let forest = build_forest(
            vec![task("x", None), task("y", None), task("x1", Some("x"))],
            None,
        );
        let ids: Vec<&str> = forest.iter().map(|t| t.task.id.as_str()).collect();
        assert_eq!(ids, vec!["x", "y"]);
    }
}
