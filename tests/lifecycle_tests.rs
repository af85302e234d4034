//! End-to-end problem lifecycle tests through the database layer.

use pm_agent::db::Database;
use pm_agent::error::{CommandError, ErrorCode};
use pm_agent::lifecycle::{InvalidTransition, ProblemState};
use pm_agent::types::NewProblem;
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::TempDir;

fn setup_db() -> Database {
    Database::open_in_memory().expect("Failed to create in-memory database")
}

fn new_problem(db: &Database) -> String {
    db.add_problem(NewProblem {
        title: "API response times > 2s".to_string(),
        ..Default::default()
    })
    .expect("Failed to add problem")
    .id
}

fn drive(db: &Database, id: &str, events: &[&str]) {
    for event in events {
        db.transition_problem(id, event)
            .unwrap_or_else(|e| panic!("{} failed: {:#}", event, e));
    }
}

fn stored_state(db: &Database, id: &str) -> ProblemState {
    db.get_problem(id).unwrap().unwrap().problem.state
}

/// Install a trigger that runs `RAISE(<raise>)` on every state update.
fn block_state_updates(db: &Database, raise: &str) {
    db.with_conn(|conn| {
        conn.execute_batch(&format!(
            "CREATE TRIGGER block_state BEFORE UPDATE OF state ON problems
             BEGIN SELECT RAISE({raise}); END;"
        ))?;
        Ok(())
    })
    .expect("Failed to create trigger");
}

mod scenario_tests {
    use super::*;

    #[test]
    fn triage_moves_identified_to_triaged() {
        let db = setup_db();
        let id = new_problem(&db);

        let detail = db.transition_problem(&id, "TRIAGE").unwrap();
        assert_eq!(detail.problem.state, ProblemState::Triaged);
        assert_eq!(stored_state(&db, &id), ProblemState::Triaged);
    }

    #[test]
    fn start_from_identified_is_rejected_without_write() {
        let db = setup_db();
        let id = new_problem(&db);
        let before = db.get_problem(&id).unwrap().unwrap().problem;

        let err = db.transition_problem(&id, "START").unwrap_err();
        let rejected = err.downcast_ref::<InvalidTransition>().unwrap();
        assert_eq!(rejected.event, "START");
        assert_eq!(rejected.state, ProblemState::Identified);

        let after = db.get_problem(&id).unwrap().unwrap().problem;
        assert_eq!(after, before);
    }

    #[test]
    fn reopen_resolved_returns_to_triaged() {
        let db = setup_db();
        let id = new_problem(&db);
        drive(&db, &id, &["TRIAGE", "START", "RESOLVE"]);
        assert_eq!(stored_state(&db, &id), ProblemState::Resolved);

        let detail = db.transition_problem(&id, "REOPEN").unwrap();
        assert_eq!(detail.problem.state, ProblemState::Triaged);
    }

    #[test]
    fn reopen_wont_fix_then_start() {
        let db = setup_db();
        let id = new_problem(&db);
        drive(&db, &id, &["TRIAGE", "WONT_FIX"]);
        assert_eq!(stored_state(&db, &id), ProblemState::WontFix);

        drive(&db, &id, &["REOPEN"]);
        assert_eq!(stored_state(&db, &id), ProblemState::Triaged);
        drive(&db, &id, &["START"]);
        assert_eq!(stored_state(&db, &id), ProblemState::InProgress);
    }

    #[test]
    fn unknown_problem_is_not_found_and_creates_nothing() {
        let db = setup_db();
        let err = CommandError::from(db.transition_problem("nonexistent-id", "TRIAGE").unwrap_err());
        assert_eq!(err.code, ErrorCode::NotFound);
        assert_eq!(err.id.as_deref(), Some("nonexistent-id"));
        assert!(db.list_problems(None).unwrap().is_empty());
    }

    #[test]
    fn unknown_and_lowercase_events_are_rejected() {
        let db = setup_db();
        let id = new_problem(&db);

        for event in ["triage", "ESCALATE", ""] {
            let err = CommandError::from(db.transition_problem(&id, event).unwrap_err());
            assert_eq!(err.code, ErrorCode::InvalidTransition);
            assert_eq!(err.details.as_deref(), Some("Allowed events: TRIAGE"));
        }
        assert_eq!(stored_state(&db, &id), ProblemState::Identified);
    }

    #[test]
    fn transition_bumps_updated_at_only() {
        let db = setup_db();
        let id = new_problem(&db);
        let before = db.get_problem(&id).unwrap().unwrap().problem;

        let after = db.transition_problem(&id, "TRIAGE").unwrap().problem;
        assert_eq!(after.created_at, before.created_at);
        assert!(after.updated_at >= before.updated_at);
        assert_eq!(after.title, before.title);
    }

    #[test]
    fn storage_failure_leaves_problem_untouched() {
        let db = setup_db();
        let id = new_problem(&db);
        let before = db.get_problem(&id).unwrap().unwrap().problem;
        block_state_updates(&db, "ABORT, 'disk full'");

        let err = CommandError::from(db.transition_problem(&id, "TRIAGE").unwrap_err());
        assert_eq!(err.code, ErrorCode::DatabaseError);
        assert!(err.message.contains("disk full"), "{}", err.message);

        let after = db.get_problem(&id).unwrap().unwrap().problem;
        assert_eq!(after.state, ProblemState::Identified);
        assert_eq!(after.updated_at, before.updated_at);
    }

    #[test]
    fn unapplied_update_is_reported_as_concurrent_change() {
        let db = setup_db();
        let id = new_problem(&db);
        // IGNORE skips the row, so the conditional UPDATE reports no change
        block_state_updates(&db, "IGNORE");

        let err = CommandError::from(db.transition_problem(&id, "TRIAGE").unwrap_err());
        assert_eq!(err.code, ErrorCode::DatabaseError);
        assert!(err.message.contains("modified concurrently"), "{}", err.message);
        assert_eq!(stored_state(&db, &id), ProblemState::Identified);
    }

    #[test]
    fn transition_returns_assigned_entities() {
        let db = setup_db();
        let id = new_problem(&db);
        let backend = db.add_entity("Backend", None, None).unwrap();
        db.assign_problem(&id, &backend.id).unwrap();

        let detail = db.transition_problem(&id, "TRIAGE").unwrap();
        assert_eq!(detail.entities.len(), 1);
        assert_eq!(detail.entities[0].id, backend.id);
    }
}

mod concurrency_tests {
    use super::*;

    #[test]
    fn racing_transitions_from_same_state_serialize() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let path = dir.path().join("race.db");

        let db = Database::open(&path).unwrap();
        let id = new_problem(&db);
        drive(&db, &id, &["TRIAGE"]);
        let other = Database::open(&path).unwrap();

        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = [db.clone(), other]
            .into_iter()
            .map(|handle| {
                let barrier = Arc::clone(&barrier);
                let id = id.clone();
                thread::spawn(move || {
                    barrier.wait();
                    handle.transition_problem(&id, "START")
                })
            })
            .collect();

        let results: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().expect("transition thread panicked"))
            .collect();

        let successes = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1, "exactly one START may apply");

        let failure = results.into_iter().find_map(Result::err).unwrap();
        let rejected = failure.downcast_ref::<InvalidTransition>().unwrap();
        assert_eq!(rejected.state, ProblemState::InProgress);

        assert_eq!(stored_state(&db, &id), ProblemState::InProgress);
    }

    #[test]
    fn second_handle_sees_committed_state() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let path = dir.path().join("shared.db");

        let first = Database::open(&path).unwrap();
        let id = new_problem(&first);
        let second = Database::open(&path).unwrap();

        drive(&first, &id, &["TRIAGE"]);
        drive(&second, &id, &["START"]);
        drive(&first, &id, &["RESOLVE"]);

        assert_eq!(stored_state(&second, &id), ProblemState::Resolved);
    }
}
