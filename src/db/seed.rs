//! Demo data for trying the CLI out.
//!
//! ```text
//! Acme Corp
//! ├── Engineering
//! │   ├── Backend
//! │   └── Frontend
//! └── Product
//! ```

use super::assignments::insert_assignment;
use super::entities::insert_entity;
use super::problems::{apply_transition, insert_problem};
use super::{Database, clear_all};
use crate::lifecycle::ProblemEvent;
use crate::types::NewProblem;
use anyhow::Result;
use serde::Serialize;
use tracing::info;

/// Counts of the records created by [`Database::seed_demo`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeedSummary {
    pub entities: usize,
    pub problems: usize,
    pub assignments: usize,
}

fn demo_problem(title: &str, description: &str) -> NewProblem {
    NewProblem {
        title: title.to_string(),
        description: Some(description.to_string()),
        ..Default::default()
    }
}

impl Database {
    /// Clear the store and load the demo hierarchy.
    ///
    /// Runs as one transaction: if any insert fails the existing data is
    /// left as it was.
    pub fn seed_demo(&self) -> Result<SeedSummary> {
        let summary = self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            clear_all(&tx)?;

            let acme = insert_entity(&tx, "Acme Corp", None, None)?;
            let engineering = insert_entity(&tx, "Engineering", Some(&acme.id), None)?;
            let backend = insert_entity(&tx, "Backend", Some(&engineering.id), None)?;
            let frontend = insert_entity(&tx, "Frontend", Some(&engineering.id), None)?;
            let product = insert_entity(&tx, "Product", Some(&acme.id), None)?;

            let slow_api = insert_problem(
                &tx,
                demo_problem(
                    "API response times > 2s on /users endpoint",
                    "P95 latency has degraded since last deploy",
                ),
            )?;
            let safari_crash = insert_problem(
                &tx,
                demo_problem(
                    "Dashboard crashes on Safari 17",
                    "TypeError in chart rendering library",
                ),
            )?;
            let onboarding = insert_problem(
                &tx,
                demo_problem(
                    "No onboarding flow for new teams",
                    "Users churn within first 3 days without guidance",
                ),
            )?;

            apply_transition(&tx, &safari_crash.id, ProblemEvent::Triage.as_str())?;

            insert_assignment(&tx, &slow_api.id, &backend.id)?;
            insert_assignment(&tx, &safari_crash.id, &frontend.id)?;
            // Cross-cutting: affects both Product and Engineering
            insert_assignment(&tx, &onboarding.id, &product.id)?;
            insert_assignment(&tx, &onboarding.id, &engineering.id)?;

            tx.commit()?;

            Ok(SeedSummary {
                entities: 5,
                problems: 3,
                assignments: 4,
            })
        })?;

        info!(?summary, "Seeded demo data");
        Ok(summary)
    }
}
