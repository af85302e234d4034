//! Entity CRUD and tree operations.

use super::problems::parse_problem_row;
use super::{Database, count, like_pattern, new_id, now_ms};
use crate::config::DeletePolicy;
use crate::error::{CommandError, RecordKind};
use crate::types::{DeleteSummary, Entity, EntityDetail, EntityTree, EntityWithParent};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::collections::HashMap;
use tracing::{debug, info};

/// Recursive CTE naming `?1` and all of its descendants as `subtree(id)`.
const ENTITY_SUBTREE: &str = "WITH RECURSIVE subtree(id) AS (
    SELECT id FROM entities WHERE id = ?1
    UNION
    SELECT e.id FROM entities e JOIN subtree s ON e.parent_id = s.id
)";

pub fn parse_entity_row(row: &Row) -> rusqlite::Result<Entity> {
    Ok(Entity {
        id: row.get("id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        parent_id: row.get("parent_id")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

/// Internal helper to get an entity using an existing connection (avoids deadlock).
pub(crate) fn get_entity_internal(conn: &Connection, entity_id: &str) -> Result<Option<Entity>> {
    let entity = conn
        .query_row(
            "SELECT * FROM entities WHERE id = ?1",
            params![entity_id],
            parse_entity_row,
        )
        .optional()?;
    Ok(entity)
}

/// Like [`get_entity_internal`] but absent entities are a Not Found error.
pub(crate) fn require_entity(conn: &Connection, entity_id: &str) -> Result<Entity> {
    get_entity_internal(conn, entity_id)?
        .ok_or_else(|| CommandError::not_found(RecordKind::Entity, entity_id).into())
}

/// Insert an entity on an existing connection.
pub(crate) fn insert_entity(
    conn: &Connection,
    name: &str,
    parent_id: Option<&str>,
    description: Option<&str>,
) -> Result<Entity> {
    if name.trim().is_empty() {
        return Err(CommandError::missing_field("name").into());
    }
    if let Some(pid) = parent_id {
        require_entity(conn, pid)?;
    }

    let now = now_ms();
    let entity = Entity {
        id: new_id(),
        name: name.to_string(),
        description: description.map(str::to_string),
        parent_id: parent_id.map(str::to_string),
        created_at: now,
        updated_at: now,
    };
    conn.execute(
        "INSERT INTO entities (id, name, description, parent_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            entity.id,
            entity.name,
            entity.description,
            entity.parent_id,
            entity.created_at,
            entity.updated_at
        ],
    )?;

    debug!(entity_id = %entity.id, name, "Created entity");
    Ok(entity)
}

fn with_parent(conn: &Connection, entity: Entity) -> Result<EntityWithParent> {
    let parent = match entity.parent_id.as_deref() {
        Some(pid) => get_entity_internal(conn, pid)?,
        None => None,
    };
    Ok(EntityWithParent { entity, parent })
}

fn all_entities(conn: &Connection) -> Result<Vec<Entity>> {
    let mut stmt = conn.prepare("SELECT * FROM entities ORDER BY created_at, name")?;
    let entities = stmt
        .query_map([], parse_entity_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entities)
}

/// Assemble trees rooted at `root_parent` from a flat list.
fn build_forest(entities: Vec<Entity>, root_parent: Option<&str>) -> Vec<EntityTree> {
    let mut by_parent: HashMap<Option<String>, Vec<Entity>> = HashMap::new();
    for entity in entities {
        by_parent
            .entry(entity.parent_id.clone())
            .or_default()
            .push(entity);
    }

    fn attach(by_parent: &mut HashMap<Option<String>, Vec<Entity>>, parent: Option<String>) -> Vec<EntityTree> {
        let children = by_parent.remove(&parent).unwrap_or_default();
        children
            .into_iter()
            .map(|entity| {
                let children = attach(by_parent, Some(entity.id.clone()));
                EntityTree { entity, children }
            })
            .collect()
    }

    attach(&mut by_parent, root_parent.map(str::to_string))
}

impl Database {
    /// Create an entity, optionally under an existing parent.
    pub fn add_entity(
        &self,
        name: &str,
        parent_id: Option<&str>,
        description: Option<&str>,
    ) -> Result<Entity> {
        self.with_conn(|conn| insert_entity(conn, name, parent_id, description))
    }

    pub fn get_entity(&self, entity_id: &str) -> Result<Option<Entity>> {
        self.with_conn(|conn| get_entity_internal(conn, entity_id))
    }

    /// Get an entity with its parent, subtree and assigned problems.
    pub fn get_entity_detail(&self, entity_id: &str) -> Result<EntityDetail> {
        self.with_conn(|conn| {
            let entity = require_entity(conn, entity_id)?;
            let EntityWithParent { entity, parent } = with_parent(conn, entity)?;

            let mut stmt = conn.prepare(&format!(
                "{ENTITY_SUBTREE}
                 SELECT * FROM entities WHERE id IN (SELECT id FROM subtree) AND id != ?1
                 ORDER BY created_at, name"
            ))?;
            let descendants = stmt
                .query_map(params![entity_id], parse_entity_row)?
                .collect::<Result<Vec<_>, _>>()?;
            let children = build_forest(descendants, Some(entity_id));

            let mut stmt = conn.prepare(
                "SELECT p.* FROM problems p
                 INNER JOIN entity_problems ep ON ep.problem_id = p.id
                 WHERE ep.entity_id = ?1
                 ORDER BY ep.created_at",
            )?;
            let problems = stmt
                .query_map(params![entity_id], parse_problem_row)?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(EntityDetail {
                entity,
                parent,
                children,
                problems,
            })
        })
    }

    /// List all entities, each with its parent.
    pub fn list_entities(&self) -> Result<Vec<EntityWithParent>> {
        self.with_conn(|conn| {
            all_entities(conn)?
                .into_iter()
                .map(|e| with_parent(conn, e))
                .collect()
        })
    }

    /// Root entities with their full descendant trees.
    pub fn entity_tree(&self) -> Result<Vec<EntityTree>> {
        self.with_conn(|conn| Ok(build_forest(all_entities(conn)?, None)))
    }

    /// Update name and/or description. Unset fields keep their value.
    pub fn update_entity(
        &self,
        entity_id: &str,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<Entity> {
        if name.is_some_and(|n| n.trim().is_empty()) {
            return Err(CommandError::invalid_value("name", "name must not be empty").into());
        }

        let now = now_ms();

        self.with_conn(|conn| {
            let entity = require_entity(conn, entity_id)?;

            let new_name = name.map(str::to_string).unwrap_or(entity.name);
            let new_description = description.map(str::to_string).or(entity.description);

            conn.execute(
                "UPDATE entities SET name = ?1, description = ?2, updated_at = ?3 WHERE id = ?4",
                params![new_name, new_description, now, entity_id],
            )?;

            debug!(entity_id, "Updated entity");

            Ok(Entity {
                id: entity.id,
                name: new_name,
                description: new_description,
                parent_id: entity.parent_id,
                created_at: entity.created_at,
                updated_at: now,
            })
        })
    }

    /// Case-insensitive substring search on entity names.
    pub fn find_entities(&self, query: &str) -> Result<Vec<EntityWithParent>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM entities WHERE name LIKE ?1 ESCAPE '\\'
                 ORDER BY created_at, name",
            )?;
            let found = stmt
                .query_map(params![like_pattern(query)], parse_entity_row)?
                .collect::<Result<Vec<_>, _>>()?;
            found.into_iter().map(|e| with_parent(conn, e)).collect()
        })
    }

    /// Delete an entity.
    ///
    /// Child entities block the delete under [`DeletePolicy::Restrict`] and
    /// are removed with it under [`DeletePolicy::Cascade`]. Problem
    /// assignments are removed and task assignments cleared either way.
    pub fn delete_entity(&self, entity_id: &str, policy: DeletePolicy) -> Result<DeleteSummary> {
        let summary = self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            require_entity(&tx, entity_id)?;

            let children = count(
                &tx,
                "SELECT COUNT(*) FROM entities WHERE parent_id = ?1",
                entity_id,
            )?;
            if children > 0 && policy == DeletePolicy::Restrict {
                return Err(CommandError::has_dependents(
                    RecordKind::Entity,
                    entity_id,
                    "child entities",
                    children,
                )
                .into());
            }

            let assignments = tx.execute(
                &format!(
                    "{ENTITY_SUBTREE}
                     DELETE FROM entity_problems WHERE entity_id IN (SELECT id FROM subtree)"
                ),
                params![entity_id],
            )?;
            tx.execute(
                &format!(
                    "{ENTITY_SUBTREE}
                     UPDATE tasks SET entity_id = NULL WHERE entity_id IN (SELECT id FROM subtree)"
                ),
                params![entity_id],
            )?;
            let entities = tx.execute(
                &format!(
                    "{ENTITY_SUBTREE}
                     DELETE FROM entities WHERE id IN (SELECT id FROM subtree)"
                ),
                params![entity_id],
            )?;

            tx.commit()?;

            Ok(DeleteSummary {
                entities,
                assignments,
                ..Default::default()
            })
        })?;

        info!(entity_id, %policy, ?summary, "Deleted entity");
        Ok(summary)
    }
}
