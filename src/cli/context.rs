//! `context` subcommands.

use super::Runner;
use anyhow::Result;
use clap::{Args, Subcommand};

/// Arguments for the context subcommand
#[derive(Args, Debug)]
pub struct ContextArgs {
    /// Defaults to `show`
    #[command(subcommand)]
    pub action: Option<ContextAction>,
}

#[derive(Subcommand, Debug)]
pub enum ContextAction {
    /// Show the active task with its solution, problem and entity
    Show,

    /// Clear the active task
    Clear,
}

impl ContextArgs {
    pub fn run(self, runner: &Runner) -> Result<String> {
        match self.action.unwrap_or(ContextAction::Show) {
            ContextAction::Show => runner.emit(&runner.db.get_context()?),
            ContextAction::Clear => {
                runner.db.clear_active_task()?;
                runner.ack("Active task cleared")
            }
        }
    }
}
