//! Structured error types for command responses.

use crate::lifecycle::{InvalidTransition, ProblemState};
use serde::Serialize;
use std::fmt;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors
    MissingRequiredField,
    InvalidFieldValue,
    InvalidTransition,

    NotFound,

    // Conflict errors
    AlreadyExists,
    HasDependents,

    // Internal errors
    DatabaseError,
    InternalError,
}

/// Kind of record an error refers to.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Entity,
    Problem,
    Solution,
    Task,
    Assignment,
}

impl RecordKind {
    pub fn label(&self) -> &'static str {
        match self {
            RecordKind::Entity => "Entity",
            RecordKind::Problem => "Problem",
            RecordKind::Solution => "Solution",
            RecordKind::Task => "Task",
            RecordKind::Assignment => "Assignment",
        }
    }
}

/// Structured error rendered to stderr by the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct CommandError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<RecordKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Attempted event, for invalid transitions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    /// Current problem state, for invalid transitions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<ProblemState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl CommandError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            kind: None,
            id: None,
            field: None,
            event: None,
            state: None,
            details: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    // Convenience constructors

    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingRequiredField,
            format!("{} is required", field),
        )
        .with_field(field)
    }

    pub fn invalid_value(field: &str, reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidFieldValue, reason).with_field(field)
    }

    pub fn not_found(kind: RecordKind, id: &str) -> Self {
        let mut err = Self::new(
            ErrorCode::NotFound,
            format!("{} {} not found", kind.label(), id),
        );
        err.kind = Some(kind);
        err.id = Some(id.to_string());
        err
    }

    pub fn already_exists(kind: RecordKind, message: impl Into<String>) -> Self {
        let mut err = Self::new(ErrorCode::AlreadyExists, message);
        err.kind = Some(kind);
        err
    }

    pub fn has_dependents(kind: RecordKind, id: &str, dependents: &str, count: i64) -> Self {
        let mut err = Self::new(
            ErrorCode::HasDependents,
            format!(
                "{} {} has {} {}; use --cascade to delete them too",
                kind.label(),
                id,
                count,
                dependents
            ),
        );
        err.kind = Some(kind);
        err.id = Some(id.to_string());
        err
    }

    pub fn database(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::DatabaseError, err.to_string())
    }

    pub fn internal(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::InternalError, err.to_string())
    }
}

impl From<InvalidTransition> for CommandError {
    fn from(err: InvalidTransition) -> Self {
        let allowed: Vec<&str> = err
            .state
            .allowed_events()
            .iter()
            .map(|e| e.as_str())
            .collect();
        let mut out = Self::new(ErrorCode::InvalidTransition, err.to_string())
            .with_details(format!("Allowed events: {}", allowed.join(", ")));
        out.kind = Some(RecordKind::Problem);
        out.event = Some(err.event);
        out.state = Some(err.state);
        out
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CommandError {}

// Allow using ? with anyhow errors by converting them
impl From<anyhow::Error> for CommandError {
    fn from(err: anyhow::Error) -> Self {
        let err = match err.downcast::<CommandError>() {
            Ok(cmd_err) => return cmd_err,
            Err(err) => err,
        };
        let err = match err.downcast::<InvalidTransition>() {
            Ok(rejected) => return rejected.into(),
            Err(err) => err,
        };
        if err.downcast_ref::<rusqlite::Error>().is_some()
            || err.downcast_ref::<refinery::Error>().is_some()
        {
            return CommandError::database(format!("{:#}", err));
        }
        CommandError::internal(format!("{:#}", err))
    }
}

/// Result type for command operations.
pub type CommandResult<T> = std::result::Result<T, CommandError>;
