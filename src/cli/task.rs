//! `task` subcommands.

use super::{Runner, found};
use crate::error::RecordKind;
use crate::types::{NewTask, TaskFilter, TaskPatch};
use anyhow::Result;
use clap::{Args, Subcommand};

/// Arguments for the task subcommand
#[derive(Args, Debug)]
pub struct TaskArgs {
    #[command(subcommand)]
    pub action: TaskAction,
}

#[derive(Subcommand, Debug)]
pub enum TaskAction {
    /// List tasks ordered by position, then creation time
    List {
        #[arg(long)]
        solution: Option<String>,

        /// Only direct children of this task
        #[arg(long)]
        parent: Option<String>,

        #[arg(long)]
        state: Option<String>,
    },

    /// Show a task with its subtasks
    Get { id: String },

    /// Add a task
    Add {
        #[arg(long)]
        title: String,

        #[arg(long)]
        description: Option<String>,

        /// Solution ID (inherited from the parent when omitted)
        #[arg(long)]
        solution: Option<String>,

        /// Parent task ID
        #[arg(long)]
        parent: Option<String>,

        /// Owning entity ID
        #[arg(long)]
        entity: Option<String>,

        /// Sort position among siblings (default: after the last sibling)
        #[arg(long)]
        position: Option<i64>,
    },

    /// Update a task
    Update {
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        description: Option<String>,

        /// Free-form state label
        #[arg(long)]
        state: Option<String>,

        #[arg(long)]
        entity: Option<String>,

        #[arg(long)]
        position: Option<i64>,
    },

    /// Make a task the active task
    Activate { id: String },

    /// Show the task forest
    Tree {
        /// Only tasks of this solution
        #[arg(long)]
        solution: Option<String>,
    },

    /// Reparent a task (no --parent makes it a root)
    Move {
        id: String,

        #[arg(long)]
        parent: Option<String>,
    },

    /// Delete a task
    Delete {
        id: String,

        /// Delete subtasks too
        #[arg(long)]
        cascade: bool,
    },
}

impl TaskAction {
    pub fn run(self, runner: &Runner) -> Result<String> {
        let db = runner.db;
        match self {
            TaskAction::List {
                solution,
                parent,
                state,
            } => {
                let filter = TaskFilter {
                    solution_id: solution,
                    parent_id: parent,
                    state,
                };
                runner.emit(db.list_tasks(&filter)?.as_slice())
            }
            TaskAction::Get { id } => {
                runner.emit(&found(db.get_task_tree(&id)?, RecordKind::Task, &id)?)
            }
            TaskAction::Add {
                title,
                description,
                solution,
                parent,
                entity,
                position,
            } => runner.emit(&db.add_task(NewTask {
                title,
                description,
                solution_id: solution,
                parent_id: parent,
                entity_id: entity,
                position,
            })?),
            TaskAction::Update {
                id,
                title,
                description,
                state,
                entity,
                position,
            } => runner.emit(&db.update_task(
                &id,
                TaskPatch {
                    title,
                    description,
                    state,
                    entity_id: entity,
                    position,
                },
            )?),
            TaskAction::Activate { id } => runner.emit(&db.set_active_task(&id)?),
            TaskAction::Tree { solution } => {
                runner.emit(db.task_tree(solution.as_deref())?.as_slice())
            }
            TaskAction::Move { id, parent } => {
                runner.emit(&db.move_task(&id, parent.as_deref())?)
            }
            TaskAction::Delete { id, cascade } => {
                runner.emit(&db.delete_task(&id, runner.policy(cascade))?)
            }
        }
    }
}
