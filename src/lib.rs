//! pm-agent library
//!
//! Entities, problems, solutions and tasks in a SQLite store, with the
//! problem lifecycle enforced on every state change.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod format;
pub mod lifecycle;
pub mod types;
