//! `solution` subcommands.

use super::{Runner, found};
use crate::error::RecordKind;
use crate::types::SolutionPatch;
use anyhow::Result;
use clap::{Args, Subcommand};

/// Arguments for the solution subcommand
#[derive(Args, Debug)]
pub struct SolutionArgs {
    #[command(subcommand)]
    pub action: SolutionAction,
}

#[derive(Subcommand, Debug)]
pub enum SolutionAction {
    /// List solutions
    List {
        /// Only solutions for this problem
        #[arg(long)]
        problem: Option<String>,
    },

    /// Show a solution with its problem and tasks
    Get { id: String },

    /// Propose a solution for a problem
    Add {
        #[arg(long)]
        title: String,

        /// Problem ID
        #[arg(long)]
        problem: String,

        #[arg(long)]
        description: Option<String>,
    },

    /// Update a solution
    Update {
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        description: Option<String>,

        /// Free-form state label
        #[arg(long)]
        state: Option<String>,
    },

    /// Delete a solution
    Delete {
        id: String,

        /// Delete the solution's tasks too
        #[arg(long)]
        cascade: bool,
    },
}

impl SolutionAction {
    pub fn run(self, runner: &Runner) -> Result<String> {
        let db = runner.db;
        match self {
            SolutionAction::List { problem } => {
                runner.emit(db.list_solutions(problem.as_deref())?.as_slice())
            }
            SolutionAction::Get { id } => {
                runner.emit(&found(db.get_solution(&id)?, RecordKind::Solution, &id)?)
            }
            SolutionAction::Add {
                title,
                problem,
                description,
            } => runner.emit(&db.add_solution(&title, &problem, description.as_deref())?),
            SolutionAction::Update {
                id,
                title,
                description,
                state,
            } => runner.emit(&db.update_solution(
                &id,
                SolutionPatch {
                    title,
                    description,
                    state,
                },
            )?),
            SolutionAction::Delete { id, cascade } => {
                runner.emit(&db.delete_solution(&id, runner.policy(cascade))?)
            }
        }
    }
}
