//! `problem` subcommands.

use super::{Runner, found};
use crate::error::{CommandError, RecordKind};
use crate::lifecycle::ProblemState;
use crate::types::{NewProblem, ProblemPatch};
use anyhow::Result;
use clap::{Args, Subcommand};

/// Arguments for the problem subcommand
#[derive(Args, Debug)]
pub struct ProblemArgs {
    #[command(subcommand)]
    pub action: ProblemAction,
}

#[derive(Subcommand, Debug)]
pub enum ProblemAction {
    /// List problems with their assigned entities
    List {
        /// Only problems in this state (identified, triaged, in_progress, resolved, wont_fix)
        #[arg(long)]
        state: Option<String>,
    },

    /// Show a problem
    Get { id: String },

    /// Add a problem in the identified state
    Add {
        #[arg(long)]
        title: String,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        impact: Option<String>,

        #[arg(long)]
        opportunity: Option<String>,
    },

    /// Update a problem's text fields
    Update {
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        impact: Option<String>,

        #[arg(long)]
        opportunity: Option<String>,
    },

    /// Apply a lifecycle event (TRIAGE, START, RESOLVE, WONT_FIX, REOPEN)
    Transition { id: String, event: String },

    /// Find problems whose title contains QUERY
    Find { query: String },

    /// Assign a problem to an entity
    Assign { problem_id: String, entity_id: String },

    /// Remove a problem's assignment to an entity
    Unassign { problem_id: String, entity_id: String },

    /// Delete a problem
    Delete {
        id: String,

        /// Delete the problem's solutions and their tasks too
        #[arg(long)]
        cascade: bool,
    },
}

fn parse_state(state: &str) -> Result<ProblemState> {
    state
        .parse::<ProblemState>()
        .map_err(|e| CommandError::invalid_value("state", e.to_string()).into())
}

impl ProblemAction {
    pub fn run(self, runner: &Runner) -> Result<String> {
        let db = runner.db;
        match self {
            ProblemAction::List { state } => {
                let state = state.as_deref().map(parse_state).transpose()?;
                runner.emit(db.list_problems(state)?.as_slice())
            }
            ProblemAction::Get { id } => {
                runner.emit(&found(db.get_problem(&id)?, RecordKind::Problem, &id)?)
            }
            ProblemAction::Add {
                title,
                description,
                impact,
                opportunity,
            } => runner.emit(&db.add_problem(NewProblem {
                title,
                description,
                impact,
                opportunity,
            })?),
            ProblemAction::Update {
                id,
                title,
                description,
                impact,
                opportunity,
            } => runner.emit(&db.update_problem(
                &id,
                ProblemPatch {
                    title,
                    description,
                    impact,
                    opportunity,
                },
            )?),
            ProblemAction::Transition { id, event } => {
                runner.emit(&db.transition_problem(&id, &event)?)
            }
            ProblemAction::Find { query } => runner.emit(db.find_problems(&query)?.as_slice()),
            ProblemAction::Assign {
                problem_id,
                entity_id,
            } => runner.emit(&db.assign_problem(&problem_id, &entity_id)?),
            ProblemAction::Unassign {
                problem_id,
                entity_id,
            } => {
                db.unassign_problem(&problem_id, &entity_id)?;
                runner.ack(format!(
                    "Unassigned problem {} from entity {}",
                    problem_id, entity_id
                ))
            }
            ProblemAction::Delete { id, cascade } => {
                runner.emit(&db.delete_problem(&id, runner.policy(cascade))?)
            }
        }
    }
}
