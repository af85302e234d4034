//! CLI command definitions for pm-agent
//!
//! The top-level `Cli` struct carries the global flags; each resource has
//! its own module with a clap `Subcommand` enum and a `run` method that
//! executes it against a [`Runner`].

pub mod context;
pub mod entity;
pub mod problem;
pub mod solution;
pub mod task;

use crate::config::DeletePolicy;
use crate::db::Database;
use crate::error::{CommandError, RecordKind};
use crate::format::{Ack, OutputFormat, ToMarkdown, render};
use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use context::ContextArgs;
use entity::EntityArgs;
use problem::ProblemArgs;
use serde::Serialize;
use solution::SolutionArgs;
use std::path::PathBuf;
use task::TaskArgs;

/// Output format selectable on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliFormat {
    Json,
    Markdown,
}

impl From<CliFormat> for OutputFormat {
    fn from(format: CliFormat) -> Self {
        match format {
            CliFormat::Json => OutputFormat::Json,
            CliFormat::Markdown => OutputFormat::Markdown,
        }
    }
}

/// Track entities, problems, solutions and tasks with an enforced problem lifecycle
#[derive(Parser, Debug)]
#[command(name = "pm-agent", author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (replaces the project and user tiers)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to database file (overrides config)
    #[arg(short, long, global = true)]
    pub database: Option<PathBuf>,

    /// Output format (overrides config)
    #[arg(short, long, value_enum, global = true)]
    pub format: Option<CliFormat>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show the active task, entity tree, problems, solutions and tasks
    Status,

    /// Delete every record in the store
    Reset,

    /// Replace the store contents with demo data
    Seed,

    /// Manage organizational entities
    Entity(EntityArgs),

    /// Manage problems and their lifecycle
    Problem(ProblemArgs),

    /// Manage solutions
    Solution(SolutionArgs),

    /// Manage tasks
    Task(TaskArgs),

    /// Show or clear the active task
    Context(ContextArgs),
}

/// Executes parsed commands against an open database.
pub struct Runner<'a> {
    pub db: &'a Database,
    pub delete_policy: DeletePolicy,
    pub format: OutputFormat,
}

impl<'a> Runner<'a> {
    pub fn new(db: &'a Database, delete_policy: DeletePolicy, format: OutputFormat) -> Self {
        Self {
            db,
            delete_policy,
            format,
        }
    }

    /// Run a command and return its rendered output.
    pub fn run(&self, command: Command) -> Result<String> {
        match command {
            Command::Status => self.emit(&self.db.status()?),
            Command::Reset => self.emit(&self.db.reset_all()?),
            Command::Seed => self.emit(&self.db.seed_demo()?),
            Command::Entity(args) => args.action.run(self),
            Command::Problem(args) => args.action.run(self),
            Command::Solution(args) => args.action.run(self),
            Command::Task(args) => args.action.run(self),
            Command::Context(args) => args.run(self),
        }
    }

    /// Render a value in the configured output format.
    pub fn emit<T: Serialize + ToMarkdown + ?Sized>(&self, value: &T) -> Result<String> {
        render(value, self.format)
    }

    pub fn ack(&self, message: impl Into<String>) -> Result<String> {
        self.emit(&Ack::with_message(message))
    }

    /// `--cascade` forces cascading; otherwise the configured policy applies.
    pub fn policy(&self, cascade: bool) -> DeletePolicy {
        if cascade {
            DeletePolicy::Cascade
        } else {
            self.delete_policy
        }
    }
}

/// Unwrap an optional lookup, turning `None` into a Not Found error.
pub(crate) fn found<T>(value: Option<T>, kind: RecordKind, id: &str) -> Result<T> {
    value.ok_or_else(|| CommandError::not_found(kind, id).into())
}
