//! Output formatting for command results: pretty JSON or markdown.

use crate::db::seed::SeedSummary;
use crate::types::{
    Assignment, Context, DeleteSummary, Entity, EntityDetail, EntityTree, EntityWithParent,
    Problem, ProblemDetail, Solution, SolutionDetail, StatusReport, Task, TaskTree,
};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Markdown,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(OutputFormat::Json),
            "markdown" | "md" => Some(OutputFormat::Markdown),
            _ => None,
        }
    }
}

/// Values that have a markdown rendering.
pub trait ToMarkdown {
    fn to_markdown(&self) -> String;
}

/// Render a command result in the requested format.
pub fn render<T: Serialize + ToMarkdown + ?Sized>(value: &T, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(value)?),
        OutputFormat::Markdown => Ok(value.to_markdown()),
    }
}

/// Plain acknowledgement for commands with no record to show.
#[derive(Debug, Clone, Serialize)]
pub struct Ack {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Ack {
    pub fn ok() -> Self {
        Self {
            ok: true,
            message: None,
        }
    }

    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: Some(message.into()),
        }
    }
}

fn timestamp(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ms.to_string())
}

fn push_optional(md: &mut String, label: &str, value: Option<&str>) {
    if let Some(value) = value {
        md.push_str(&format!("- **{}**: {}\n", label, value));
    }
}

fn entity_line(entity: &Entity) -> String {
    format!("{} (`{}`)", entity.name, entity.id)
}

fn problem_line(problem: &Problem) -> String {
    format!("[{}] {} (`{}`)", problem.state, problem.title, problem.id)
}

fn task_line(task: &Task) -> String {
    format!("[{}] {} (`{}`)", task.state, task.title, task.id)
}

fn push_entity_tree(md: &mut String, trees: &[EntityTree], depth: usize) {
    for tree in trees {
        md.push_str(&format!("{}- {}\n", "  ".repeat(depth), entity_line(&tree.entity)));
        push_entity_tree(md, &tree.children, depth + 1);
    }
}

fn push_task_tree(md: &mut String, trees: &[TaskTree], depth: usize) {
    for tree in trees {
        md.push_str(&format!("{}- {}\n", "  ".repeat(depth), task_line(&tree.task)));
        push_task_tree(md, &tree.children, depth + 1);
    }
}

impl ToMarkdown for Ack {
    fn to_markdown(&self) -> String {
        match &self.message {
            Some(message) => format!("OK: {}\n", message),
            None => "OK\n".to_string(),
        }
    }
}

impl ToMarkdown for Entity {
    fn to_markdown(&self) -> String {
        let mut md = format!("## Entity: {}\n- **id**: `{}`\n", self.name, self.id);
        push_optional(&mut md, "parent_id", self.parent_id.as_deref());
        push_optional(&mut md, "description", self.description.as_deref());
        md.push_str(&format!("- **updated**: {}\n", timestamp(self.updated_at)));
        md
    }
}

impl ToMarkdown for EntityDetail {
    fn to_markdown(&self) -> String {
        let mut md = self.entity.to_markdown();
        if let Some(parent) = &self.parent {
            md.push_str(&format!("- **parent**: {}\n", entity_line(parent)));
        }
        if !self.children.is_empty() {
            md.push_str("\n### Children\n");
            push_entity_tree(&mut md, &self.children, 0);
        }
        if !self.problems.is_empty() {
            md.push_str("\n### Problems\n");
            for problem in &self.problems {
                md.push_str(&format!("- {}\n", problem_line(problem)));
            }
        }
        md
    }
}

impl ToMarkdown for [EntityWithParent] {
    fn to_markdown(&self) -> String {
        let mut md = format!("# Entities ({})\n\n", self.len());
        for item in self {
            match &item.parent {
                Some(parent) => md.push_str(&format!(
                    "- {} under {}\n",
                    entity_line(&item.entity),
                    parent.name
                )),
                None => md.push_str(&format!("- {}\n", entity_line(&item.entity))),
            }
        }
        md
    }
}

impl ToMarkdown for [EntityTree] {
    fn to_markdown(&self) -> String {
        let mut md = String::from("# Entity Tree\n\n");
        push_entity_tree(&mut md, self, 0);
        md
    }
}

impl ToMarkdown for Problem {
    fn to_markdown(&self) -> String {
        let mut md = format!("## Problem: {}\n", self.title);
        md.push_str(&format!("- **id**: `{}`\n", self.id));
        md.push_str(&format!("- **state**: {}\n", self.state));
        let next: Vec<&str> = self
            .state
            .allowed_events()
            .iter()
            .map(|e| e.as_str())
            .collect();
        md.push_str(&format!("- **next**: {}\n", next.join(", ")));
        push_optional(&mut md, "impact", self.impact.as_deref());
        push_optional(&mut md, "opportunity", self.opportunity.as_deref());
        md.push_str(&format!("- **updated**: {}\n", timestamp(self.updated_at)));
        if let Some(desc) = &self.description {
            md.push_str("\n### Description\n");
            md.push_str(desc);
            md.push('\n');
        }
        md
    }
}

impl ToMarkdown for ProblemDetail {
    fn to_markdown(&self) -> String {
        let mut md = self.problem.to_markdown();
        if !self.entities.is_empty() {
            let names: Vec<String> = self.entities.iter().map(entity_line).collect();
            md.push_str(&format!("\n**Assigned to**: {}\n", names.join(", ")));
        }
        md
    }
}

impl ToMarkdown for [ProblemDetail] {
    fn to_markdown(&self) -> String {
        let mut md = format!("# Problems ({})\n\n", self.len());
        for detail in self {
            md.push_str(&format!("- {}", problem_line(&detail.problem)));
            if !detail.entities.is_empty() {
                let names: Vec<&str> = detail.entities.iter().map(|e| e.name.as_str()).collect();
                md.push_str(&format!(" → {}", names.join(", ")));
            }
            md.push('\n');
        }
        md
    }
}

impl ToMarkdown for Assignment {
    fn to_markdown(&self) -> String {
        format!(
            "Assigned problem `{}` to entity `{}`\n",
            self.problem_id, self.entity_id
        )
    }
}

impl ToMarkdown for Solution {
    fn to_markdown(&self) -> String {
        let mut md = format!("## Solution: {}\n", self.title);
        md.push_str(&format!("- **id**: `{}`\n", self.id));
        md.push_str(&format!("- **state**: {}\n", self.state));
        md.push_str(&format!("- **problem_id**: `{}`\n", self.problem_id));
        if let Some(desc) = &self.description {
            md.push_str("\n### Description\n");
            md.push_str(desc);
            md.push('\n');
        }
        md
    }
}

impl ToMarkdown for SolutionDetail {
    fn to_markdown(&self) -> String {
        let mut md = self.solution.to_markdown();
        md.push_str(&format!("\n**Problem**: {}\n", problem_line(&self.problem)));
        if !self.tasks.is_empty() {
            md.push_str("\n### Tasks\n");
            push_task_tree(&mut md, &self.tasks, 0);
        }
        md
    }
}

impl ToMarkdown for [Solution] {
    fn to_markdown(&self) -> String {
        let mut md = format!("# Solutions ({})\n\n", self.len());
        for solution in self {
            md.push_str(&format!(
                "- [{}] {} (`{}`) for `{}`\n",
                solution.state, solution.title, solution.id, solution.problem_id
            ));
        }
        md
    }
}

impl ToMarkdown for Task {
    fn to_markdown(&self) -> String {
        let mut md = format!("## Task: {}\n", self.title);
        md.push_str(&format!("- **id**: `{}`\n", self.id));
        md.push_str(&format!("- **state**: {}\n", self.state));
        md.push_str(&format!("- **position**: {}\n", self.position));
        push_optional(&mut md, "solution_id", self.solution_id.as_deref());
        push_optional(&mut md, "parent_id", self.parent_id.as_deref());
        push_optional(&mut md, "entity_id", self.entity_id.as_deref());
        if let Some(desc) = &self.description {
            md.push_str("\n### Description\n");
            md.push_str(desc);
            md.push('\n');
        }
        md
    }
}

impl ToMarkdown for TaskTree {
    fn to_markdown(&self) -> String {
        let mut md = self.task.to_markdown();
        if !self.children.is_empty() {
            md.push_str("\n### Subtasks\n");
            push_task_tree(&mut md, &self.children, 0);
        }
        md
    }
}

impl ToMarkdown for [Task] {
    fn to_markdown(&self) -> String {
        let mut md = format!("# Tasks ({})\n\n", self.len());
        for task in self {
            md.push_str(&format!("- {}\n", task_line(task)));
        }
        md
    }
}

impl ToMarkdown for [TaskTree] {
    fn to_markdown(&self) -> String {
        let mut md = String::from("# Task Tree\n\n");
        push_task_tree(&mut md, self, 0);
        md
    }
}

impl ToMarkdown for Context {
    fn to_markdown(&self) -> String {
        let Some(task) = &self.active_task else {
            return "No active task\n".to_string();
        };
        let mut md = format!("# Active task\n\n- {}\n", task_line(task));
        if let Some(solution) = &self.solution {
            md.push_str(&format!("- **solution**: {} (`{}`)\n", solution.title, solution.id));
        }
        if let Some(problem) = &self.problem {
            md.push_str(&format!("- **problem**: {}\n", problem_line(problem)));
        }
        if let Some(entity) = &self.entity {
            md.push_str(&format!("- **entity**: {}\n", entity_line(entity)));
        }
        md
    }
}

impl ToMarkdown for StatusReport {
    fn to_markdown(&self) -> String {
        let mut md = self.context.to_markdown();
        md.push('\n');
        md.push_str(&self.entities.to_markdown());
        md.push('\n');
        md.push_str(&self.problems.to_markdown());
        md.push('\n');
        md.push_str(&self.solutions.to_markdown());
        md.push('\n');
        md.push_str(&self.tasks.to_markdown());
        md
    }
}

impl ToMarkdown for DeleteSummary {
    fn to_markdown(&self) -> String {
        let mut md = String::from("Deleted:\n");
        for (label, n) in [
            ("entities", self.entities),
            ("problems", self.problems),
            ("assignments", self.assignments),
            ("solutions", self.solutions),
            ("tasks", self.tasks),
        ] {
            if n > 0 {
                md.push_str(&format!("- {}: {}\n", label, n));
            }
        }
        if self.context_cleared {
            md.push_str("- active task cleared\n");
        }
        md
    }
}

impl ToMarkdown for SeedSummary {
    fn to_markdown(&self) -> String {
        format!(
            "Seeded:\n- {} entities\n- {} problems\n- {} entity-problem links\n",
            self.entities, self.problems, self.assignments
        )
    }
}
