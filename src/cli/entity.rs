//! `entity` subcommands.

use super::Runner;
use anyhow::Result;
use clap::{Args, Subcommand};

/// Arguments for the entity subcommand
#[derive(Args, Debug)]
pub struct EntityArgs {
    #[command(subcommand)]
    pub action: EntityAction,
}

#[derive(Subcommand, Debug)]
pub enum EntityAction {
    /// List all entities with their parents
    List,

    /// Show the entity hierarchy
    Tree,

    /// Add an entity
    Add {
        name: String,

        /// Parent entity ID
        #[arg(long)]
        parent: Option<String>,

        #[arg(long)]
        description: Option<String>,
    },

    /// Update an entity's name or description
    Update {
        id: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        description: Option<String>,
    },

    /// Find entities whose name contains QUERY
    Find { query: String },

    /// Show an entity with its parent, children and problems
    Get { id: String },

    /// Delete an entity
    Delete {
        id: String,

        /// Delete child entities too
        #[arg(long)]
        cascade: bool,
    },
}

impl EntityAction {
    pub fn run(self, runner: &Runner) -> Result<String> {
        let db = runner.db;
        match self {
            EntityAction::List => runner.emit(db.list_entities()?.as_slice()),
            EntityAction::Tree => runner.emit(db.entity_tree()?.as_slice()),
            EntityAction::Add {
                name,
                parent,
                description,
            } => runner.emit(&db.add_entity(&name, parent.as_deref(), description.as_deref())?),
            EntityAction::Update {
                id,
                name,
                description,
            } => runner.emit(&db.update_entity(&id, name.as_deref(), description.as_deref())?),
            EntityAction::Find { query } => runner.emit(db.find_entities(&query)?.as_slice()),
            EntityAction::Get { id } => runner.emit(&db.get_entity_detail(&id)?),
            EntityAction::Delete { id, cascade } => {
                runner.emit(&db.delete_entity(&id, runner.policy(cascade))?)
            }
        }
    }
}
