//! Integration tests for the Relay CLI commands, run against an in-memory
//! database. Blueprint files are written to a temp directory.

use std::path::PathBuf;
use std::sync::Arc;

use relay_cli::commands;
use relay_core::models::run::RunStatus;
use relay_core::state::{AppState, AppStateInner};
use relay_core::workflow::decode_credential;
use relay_core::Database;

fn test_state() -> AppState {
    let db = Database::open(":memory:").expect("Failed to open in-memory database");
    Arc::new(AppStateInner::new(db))
}

fn write_blueprint(dir: &tempfile::TempDir, name: &str, json: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, json).unwrap();
    path
}

const BRANCHING: &str = r#"{
    "version": "1.0",
    "trigger": { "type": "manual" },
    "variables": { "score": 3 },
    "steps": [{
        "id": "check", "type": "condition",
        "condition": {
            "expression": "trigger.score > score",
            "if_true": [ { "id": "wait", "type": "delay", "delay": { "duration_seconds": 0 } } ]
        }
    }]
}"#;

#[test]
fn test_validate_accepts_and_rejects() {
    let dir = tempfile::tempdir().unwrap();
    let good = write_blueprint(&dir, "good.json", BRANCHING);
    assert!(commands::automation::validate(good.to_str().unwrap()).is_ok());

    let bad = write_blueprint(
        &dir,
        "bad.json",
        r#"{ "steps": [ { "id": "x", "type": "teleport" } ] }"#,
    );
    let err = commands::automation::validate(bad.to_str().unwrap()).unwrap_err();
    assert!(err.contains("Unknown step type: teleport"), "got: {err}");

    let missing = dir.path().join("missing.json");
    assert!(commands::automation::validate(missing.to_str().unwrap()).is_err());
}

#[tokio::test]
async fn test_import_defaults_name_to_file_stem() {
    let state = test_state();
    let dir = tempfile::tempdir().unwrap();
    let path = write_blueprint(&dir, "score-check.json", BRANCHING);

    commands::automation::import(&state, path.to_str().unwrap(), "u1", None, Some("a1"))
        .await
        .unwrap();

    let stored = state.automation_store.get("a1").await.unwrap().unwrap();
    assert_eq!(stored.name, "score-check");
    assert_eq!(stored.user_id, "u1");
    assert_eq!(stored.blueprint.steps.len(), 1);

    assert!(commands::automation::list(&state, "u1").await.is_ok());
}

#[tokio::test]
async fn test_credential_add_normalizes_platform() {
    let state = test_state();
    let dir = tempfile::tempdir().unwrap();
    let path = write_blueprint(&dir, "bp.json", BRANCHING);
    commands::automation::import(&state, path.to_str().unwrap(), "u1", Some("Bp"), Some("a1"))
        .await
        .unwrap();

    commands::credential::add(&state, "a1", "u1", " Slack ", r#"{"access_token":"xoxb-1"}"#)
        .await
        .unwrap();

    let records = state.credential_store.list_active("a1", "u1").await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].platform, "slack");
    let fields = decode_credential(&records[0].encoded_data).unwrap();
    assert_eq!(fields.get("access_token").map(String::as_str), Some("xoxb-1"));
}

#[tokio::test]
async fn test_credential_add_rejects_bad_input() {
    let state = test_state();
    let err = commands::credential::add(&state, "a1", "u1", "slack", r#"["not","an","object"]"#)
        .await
        .unwrap_err();
    assert!(err.contains("must be a JSON object"));

    let err = commands::credential::add(&state, "a1", "u1", "sl ack", "{}")
        .await
        .unwrap_err();
    assert!(err.contains("sl ack"), "got: {err}");
}

#[tokio::test]
async fn test_agent_add_and_lookup() {
    let state = test_state();
    commands::agent::add(
        &state,
        commands::agent::NewAgent {
            id: Some("ag1"),
            user_id: "u1",
            name: "Summarizer",
            rules: "Be brief.",
            api_key: "sk-test",
            model: "gpt-4o",
            provider: " OpenAI ",
        },
    )
    .await
    .unwrap();

    let agent = state.agent_store.get("ag1").await.unwrap().unwrap();
    assert_eq!(agent.llm_provider, "openai");
    assert_eq!(agent.model, "gpt-4o");
    assert_eq!(agent.api_key, "sk-test");

    assert!(commands::agent::list(&state, "u1").await.is_ok());
}

#[tokio::test]
async fn test_run_records_completed_run() {
    let state = test_state();
    let dir = tempfile::tempdir().unwrap();
    let path = write_blueprint(&dir, "bp.json", BRANCHING);
    commands::automation::import(&state, path.to_str().unwrap(), "u1", None, Some("a1"))
        .await
        .unwrap();

    commands::run::run(&state, "a1", "u1", Some(r#"{"score": 10}"#))
        .await
        .unwrap();

    let runs = state.run_store.list_by_automation("a1").await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, RunStatus::Completed);
    assert!(commands::run::status(&state, &runs[0].id).await.is_ok());
}

#[tokio::test]
async fn test_run_errors() {
    let state = test_state();

    let err = commands::run::run(&state, "ghost", "u1", None).await.unwrap_err();
    assert_eq!(err, "Automation not found: ghost");

    let err = commands::run::run(&state, "ghost", "u1", Some("{not json"))
        .await
        .unwrap_err();
    assert!(err.starts_with("Invalid trigger JSON"));

    let err = commands::run::status(&state, "nope").await.unwrap_err();
    assert_eq!(err, "Run nope not found");
}
