//! Whole-store overview for the `status` command.

use super::Database;
use crate::types::{StatusReport, TaskFilter};
use anyhow::Result;

impl Database {
    /// Context, entity tree, problems, solutions and tasks in one report.
    pub fn status(&self) -> Result<StatusReport> {
        Ok(StatusReport {
            context: self.get_context()?,
            entities: self.entity_tree()?,
            problems: self.list_problems(None)?,
            solutions: self.list_solutions(None)?,
            tasks: self.list_tasks(&TaskFilter::default())?,
        })
    }
}
