//! Core record types for the pm-agent store.

use crate::lifecycle::ProblemState;
use serde::{Deserialize, Serialize};

/// Default state for new solutions.
pub const SOLUTION_DEFAULT_STATE: &str = "proposed";

/// Default state for new tasks.
pub const TASK_DEFAULT_STATE: &str = "pending";

/// An organizational unit (company, department, team).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub parent_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// An entity together with its parent record, for list/find output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityWithParent {
    #[serde(flatten)]
    pub entity: Entity,
    pub parent: Option<Entity>,
}

/// An entity with its surroundings, as printed by `entity get`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDetail {
    #[serde(flatten)]
    pub entity: Entity,
    pub parent: Option<Entity>,
    pub children: Vec<EntityTree>,
    pub problems: Vec<Problem>,
}

/// An entity with its descendants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityTree {
    #[serde(flatten)]
    pub entity: Entity,
    pub children: Vec<EntityTree>,
}

/// A tracked problem. `state` is governed by [`crate::lifecycle`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub impact: Option<String>,
    pub opportunity: Option<String>,
    pub state: ProblemState,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A problem with the entities it is assigned to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemDetail {
    #[serde(flatten)]
    pub problem: Problem,
    pub entities: Vec<Entity>,
}

/// Link row between an entity and a problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: String,
    pub entity_id: String,
    pub problem_id: String,
    pub created_at: i64,
}

/// Input for creating a problem.
#[derive(Debug, Clone, Default)]
pub struct NewProblem {
    pub title: String,
    pub description: Option<String>,
    pub impact: Option<String>,
    pub opportunity: Option<String>,
}

/// Partial update of a problem's text fields. State is not updatable here.
#[derive(Debug, Clone, Default)]
pub struct ProblemPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub impact: Option<String>,
    pub opportunity: Option<String>,
}

/// A proposed remedy for one problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub problem_id: String,
    pub state: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A solution with its problem and task forest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolutionDetail {
    #[serde(flatten)]
    pub solution: Solution,
    pub problem: Problem,
    pub tasks: Vec<TaskTree>,
}

#[derive(Debug, Clone, Default)]
pub struct SolutionPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub state: Option<String>,
}

/// A unit of work implementing a solution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub solution_id: Option<String>,
    pub parent_id: Option<String>,
    pub entity_id: Option<String>,
    pub state: String,
    pub position: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A task with its children for tree operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskTree {
    #[serde(flatten)]
    pub task: Task,
    pub children: Vec<TaskTree>,
}

#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub solution_id: Option<String>,
    pub parent_id: Option<String>,
    pub entity_id: Option<String>,
    pub position: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub state: Option<String>,
    pub entity_id: Option<String>,
    pub position: Option<i64>,
}

/// Filters for listing tasks. All set filters must match.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub solution_id: Option<String>,
    pub parent_id: Option<String>,
    pub state: Option<String>,
}

/// The active task with the records around it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Context {
    pub active_task: Option<Task>,
    pub solution: Option<Solution>,
    pub problem: Option<Problem>,
    pub entity: Option<Entity>,
}

/// Everything in the store, as printed by `status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub context: Context,
    pub entities: Vec<EntityTree>,
    pub problems: Vec<ProblemDetail>,
    pub solutions: Vec<Solution>,
    pub tasks: Vec<Task>,
}

/// Row counts removed by a delete or reset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeleteSummary {
    pub entities: usize,
    pub problems: usize,
    pub assignments: usize,
    pub solutions: usize,
    pub tasks: usize,
    /// Whether the active task pointer was cleared.
    pub context_cleared: bool,
}
