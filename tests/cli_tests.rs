//! Command-line parsing and execution tests.
//!
//! Commands are parsed with clap and executed through `Runner` against an
//! in-memory database, checking the rendered output.

use clap::Parser;
use pm_agent::cli::{Cli, Runner};
use pm_agent::config::DeletePolicy;
use pm_agent::db::Database;
use pm_agent::error::{CommandError, ErrorCode};
use pm_agent::format::OutputFormat;
use serde_json::Value;

fn setup_db() -> Database {
    Database::open_in_memory().expect("Failed to create in-memory database")
}

fn run_with(db: &Database, format: OutputFormat, args: &[&str]) -> anyhow::Result<String> {
    let argv = std::iter::once("pm-agent").chain(args.iter().copied());
    let cli = Cli::try_parse_from(argv).expect("Failed to parse arguments");
    Runner::new(db, DeletePolicy::Restrict, format).run(cli.command)
}

fn run_json(db: &Database, args: &[&str]) -> Value {
    let out = run_with(db, OutputFormat::Json, args)
        .unwrap_or_else(|e| panic!("{:?} failed: {:#}", args, e));
    serde_json::from_str(&out).expect("Output is not JSON")
}

fn run_err(db: &Database, args: &[&str]) -> CommandError {
    CommandError::from(run_with(db, OutputFormat::Json, args).unwrap_err())
}

fn id_of(value: &Value) -> String {
    value["id"].as_str().expect("missing id").to_string()
}

#[test]
fn problem_add_and_transition() {
    let db = setup_db();

    let problem = run_json(&db, &["problem", "add", "--title", "Slow API", "--impact", "Churn"]);
    assert_eq!(problem["state"], "identified");
    assert_eq!(problem["impact"], "Churn");
    let id = id_of(&problem);

    let triaged = run_json(&db, &["problem", "transition", &id, "TRIAGE"]);
    assert_eq!(triaged["state"], "triaged");
    assert_eq!(triaged["entities"], Value::Array(vec![]));
}

#[test]
fn rejected_transition_carries_event_and_state() {
    let db = setup_db();
    let id = id_of(&run_json(&db, &["problem", "add", "--title", "P"]));

    let err = run_err(&db, &["problem", "transition", &id, "START"]);
    assert_eq!(err.code, ErrorCode::InvalidTransition);

    let body = serde_json::to_value(&err).unwrap();
    assert_eq!(body["code"], "INVALID_TRANSITION");
    assert_eq!(body["event"], "START");
    assert_eq!(body["state"], "identified");
}

#[test]
fn problem_get_unknown_is_not_found() {
    let db = setup_db();
    let err = run_err(&db, &["problem", "get", "missing"]);
    assert_eq!(err.code, ErrorCode::NotFound);
    assert_eq!(err.message, "Problem missing not found");
}

#[test]
fn problem_list_state_filter_is_validated() {
    let db = setup_db();
    run_json(&db, &["seed"]);

    let triaged = run_json(&db, &["problem", "list", "--state", "triaged"]);
    assert_eq!(triaged.as_array().unwrap().len(), 1);

    let err = run_err(&db, &["problem", "list", "--state", "done"]);
    assert_eq!(err.code, ErrorCode::InvalidFieldValue);
    assert_eq!(err.field.as_deref(), Some("state"));
}

#[test]
fn assign_and_unassign() {
    let db = setup_db();
    let entity = id_of(&run_json(&db, &["entity", "add", "Backend"]));
    let problem = id_of(&run_json(&db, &["problem", "add", "--title", "P"]));

    let link = run_json(&db, &["problem", "assign", &problem, &entity]);
    assert_eq!(link["entity_id"], entity.as_str());

    let err = run_err(&db, &["problem", "assign", &problem, &entity]);
    assert_eq!(err.code, ErrorCode::AlreadyExists);

    let ack = run_json(&db, &["problem", "unassign", &problem, &entity]);
    assert_eq!(ack["ok"], true);
}

#[test]
fn entity_tree_and_find() {
    let db = setup_db();
    let acme = id_of(&run_json(&db, &["entity", "add", "Acme"]));
    run_json(&db, &["entity", "add", "Engineering", "--parent", &acme]);

    let tree = run_json(&db, &["entity", "tree"]);
    assert_eq!(tree[0]["name"], "Acme");
    assert_eq!(tree[0]["children"][0]["name"], "Engineering");

    let found = run_json(&db, &["entity", "find", "engin"]);
    assert_eq!(found[0]["parent"]["name"], "Acme");
}

#[test]
fn delete_needs_cascade_for_dependents() {
    let db = setup_db();
    let acme = id_of(&run_json(&db, &["entity", "add", "Acme"]));
    run_json(&db, &["entity", "add", "Engineering", "--parent", &acme]);

    let err = run_err(&db, &["entity", "delete", &acme]);
    assert_eq!(err.code, ErrorCode::HasDependents);

    let summary = run_json(&db, &["entity", "delete", &acme, "--cascade"]);
    assert_eq!(summary["entities"], 2);
}

#[test]
fn configured_cascade_policy_applies_without_flag() {
    let db = setup_db();
    let problem = id_of(&run_json(&db, &["problem", "add", "--title", "P"]));
    run_json(&db, &["solution", "add", "--title", "S", "--problem", &problem]);

    let cli = Cli::try_parse_from(["pm-agent", "problem", "delete", problem.as_str()]).unwrap();
    let out = Runner::new(&db, DeletePolicy::Cascade, OutputFormat::Json)
        .run(cli.command)
        .unwrap();
    let summary: Value = serde_json::from_str(&out).unwrap();
    assert_eq!(summary["problems"], 1);
    assert_eq!(summary["solutions"], 1);
}

#[test]
fn task_workflow_with_context() {
    let db = setup_db();
    let problem = id_of(&run_json(&db, &["problem", "add", "--title", "Slow API"]));
    let solution = id_of(&run_json(&db, &["solution", "add", "--title", "Cache", "--problem", &problem]));
    let root = id_of(&run_json(&db, &["task", "add", "--title", "Add Redis", "--solution", &solution]));
    let child = run_json(&db, &["task", "add", "--title", "Provision", "--parent", &root]);
    assert_eq!(child["solution_id"], solution.as_str());

    let ctx = run_json(&db, &["task", "activate", &root]);
    assert_eq!(ctx["active_task"]["id"], root.as_str());
    assert_eq!(ctx["problem"]["id"], problem.as_str());

    let shown = run_json(&db, &["context"]);
    assert_eq!(shown["solution"]["id"], solution.as_str());

    let tree = run_json(&db, &["task", "tree", "--solution", &solution]);
    assert_eq!(tree[0]["children"][0]["title"], "Provision");

    run_json(&db, &["context", "clear"]);
    let cleared = run_json(&db, &["context", "show"]);
    assert!(cleared["active_task"].is_null());
}

#[test]
fn task_move_to_root() {
    let db = setup_db();
    let a = id_of(&run_json(&db, &["task", "add", "--title", "A"]));
    let b = id_of(&run_json(&db, &["task", "add", "--title", "B", "--parent", &a]));

    let err = run_err(&db, &["task", "move", &a, "--parent", &b]);
    assert_eq!(err.code, ErrorCode::InvalidFieldValue);

    let moved = run_json(&db, &["task", "move", &b]);
    assert!(moved["parent_id"].is_null());
}

#[test]
fn markdown_output_for_problem() {
    let db = setup_db();
    let id = id_of(&run_json(&db, &["problem", "add", "--title", "Dashboard crashes"]));

    let md = run_with(&db, OutputFormat::Markdown, &["problem", "get", &id]).unwrap();
    assert!(md.starts_with("## Problem: Dashboard crashes"));
    assert!(md.contains("- **state**: identified"));
    assert!(md.contains("- **next**: TRIAGE"));
}

#[test]
fn status_after_seed_and_reset() {
    let db = setup_db();
    let seeded = run_json(&db, &["seed"]);
    assert_eq!(seeded["entities"], 5);

    let status = run_json(&db, &["status"]);
    assert_eq!(status["problems"].as_array().unwrap().len(), 3);
    assert_eq!(status["entities"][0]["name"], "Acme Corp");

    let reset = run_json(&db, &["reset"]);
    assert_eq!(reset["problems"], 3);
    let status = run_json(&db, &["status"]);
    assert!(status["problems"].as_array().unwrap().is_empty());
}
