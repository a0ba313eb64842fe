//! Integration tests for session-backed script execution
//!
//! Each test creates a session in a temporary project, runs scripts through
//! the execution engine, and checks what the session remembers afterwards.

use super::common::fixtures::{exit_code, log_lines, TestProject};
use runbooks::{ExecEvent, ExecRequest, ExecStatus, ExecutionEngine, SessionManager};
use std::fs;
use std::sync::Arc;
use std::time::Duration;

fn engine() -> (Arc<SessionManager>, ExecutionEngine) {
    let sessions = Arc::new(SessionManager::new());
    let engine = ExecutionEngine::new(sessions.clone()).with_timeout(Duration::from_secs(30));
    (sessions, engine)
}

/// Run `script` with the session context the token currently resolves to.
async fn run_in_session(
    sessions: &SessionManager,
    engine: &ExecutionEngine,
    token: &str,
    script: &str,
) -> Vec<ExecEvent> {
    let snapshot = sessions
        .validate_token(token)
        .expect("token should be valid");
    let request = ExecRequest::new(script).with_session(snapshot.exec_context());
    engine
        .run_to_completion(request)
        .await
        .expect("run should start")
}

/// Exported variables and `cd` persist into the session
#[cfg(unix)]
#[tokio::test]
async fn test_export_and_cd_persist() {
    let project = TestProject::new();
    let (sessions, engine) = engine();
    let token = sessions.create_session(&project.path).unwrap();

    let events = run_in_session(&sessions, &engine, &token, "export FOO=bar\ncd subdir\n").await;
    assert_eq!(exit_code(&events), Some(0));
    assert!(matches!(events.last(), Some(ExecEvent::Done)));

    let snapshot = sessions.validate_token(&token).unwrap();
    assert_eq!(snapshot.env.get("FOO").map(String::as_str), Some("bar"));
    assert_eq!(
        fs::canonicalize(&snapshot.working_dir).unwrap(),
        project.subdir()
    );
    assert_eq!(snapshot.execution_count, 1);
}

/// A later run starts where the previous one left off
#[cfg(unix)]
#[tokio::test]
async fn test_state_carries_into_next_run() {
    let project = TestProject::new();
    let (sessions, engine) = engine();
    let token = sessions.create_session(&project.path).unwrap();

    run_in_session(&sessions, &engine, &token, "export GREETING=hello\ncd subdir").await;
    let events = run_in_session(&sessions, &engine, &token, "echo \"$GREETING\"\npwd -P").await;

    let lines = log_lines(&events);
    assert_eq!(lines[0], "hello");
    assert_eq!(lines[1], project.subdir().to_string_lossy());
    assert_eq!(sessions.metadata().unwrap().execution_count, 2);
}

/// Every token on the session sees the same state
#[cfg(unix)]
#[tokio::test]
async fn test_joined_tab_shares_environment() {
    let project = TestProject::new();
    let (sessions, engine) = engine();
    let first = sessions.create_session(&project.path).unwrap();
    let second = sessions.join_session().unwrap();

    run_in_session(&sessions, &engine, &first, "export SHARED=yes").await;
    let events = run_in_session(&sessions, &engine, &second, "echo \"$SHARED\"").await;

    assert_eq!(log_lines(&events), vec!["yes"]);
}

/// Failed runs leave the session untouched
#[cfg(unix)]
#[tokio::test]
async fn test_failed_run_does_not_persist() {
    let project = TestProject::new();
    let (sessions, engine) = engine();
    let token = sessions.create_session(&project.path).unwrap();

    let events =
        run_in_session(&sessions, &engine, &token, "export BROKEN=1\ncd subdir\nexit 1").await;

    assert!(events
        .iter()
        .any(|e| matches!(e, ExecEvent::Status { status: ExecStatus::Fail, exit_code: 1 })));
    let snapshot = sessions.validate_token(&token).unwrap();
    assert!(!snapshot.env.contains_key("BROKEN"));
    assert_eq!(snapshot.working_dir, project.path);
    assert_eq!(snapshot.execution_count, 0);
}

/// Exit code 2 is a warning and still persists state
#[cfg(unix)]
#[tokio::test]
async fn test_warning_run_persists() {
    let project = TestProject::new();
    let (sessions, engine) = engine();
    let token = sessions.create_session(&project.path).unwrap();

    let events = run_in_session(&sessions, &engine, &token, "export PARTIAL=1\nexit 2").await;

    assert!(events
        .iter()
        .any(|e| matches!(e, ExecEvent::Status { status: ExecStatus::Warn, exit_code: 2 })));
    let snapshot = sessions.validate_token(&token).unwrap();
    assert_eq!(snapshot.env.get("PARTIAL").map(String::as_str), Some("1"));
}

/// Resetting restores the creation-time environment and directory
#[cfg(unix)]
#[tokio::test]
async fn test_reset_restores_initial_state() {
    let project = TestProject::new();
    let (sessions, engine) = engine();
    let token = sessions.create_session(&project.path).unwrap();

    run_in_session(&sessions, &engine, &token, "export TEMP_VAR=1\ncd subdir").await;
    sessions.reset_session().unwrap();

    let snapshot = sessions.validate_token(&token).unwrap();
    assert!(!snapshot.env.contains_key("TEMP_VAR"));
    assert_eq!(snapshot.working_dir, project.path);
}

/// A user EXIT trap still runs and the environment is still captured
#[cfg(unix)]
#[tokio::test]
async fn test_user_exit_trap_runs() {
    let project = TestProject::new();
    let (sessions, engine) = engine();
    let token = sessions.create_session(&project.path).unwrap();
    let marker = project.path.join("cleaned-up");

    let script = format!(
        "trap 'touch {}' EXIT\nexport AFTER_TRAP=ok",
        marker.display()
    );
    run_in_session(&sessions, &engine, &token, &script).await;

    assert!(marker.exists());
    let snapshot = sessions.validate_token(&token).unwrap();
    assert_eq!(snapshot.env.get("AFTER_TRAP").map(String::as_str), Some("ok"));
}

/// Values containing newlines survive the round trip through the session
#[cfg(unix)]
#[tokio::test]
async fn test_multiline_value_persists() {
    let project = TestProject::new();
    let (sessions, engine) = engine();
    let token = sessions.create_session(&project.path).unwrap();

    run_in_session(
        &sessions,
        &engine,
        &token,
        "export CERT=$'-----BEGIN-----\\nabc\\n-----END-----'",
    )
    .await;

    let snapshot = sessions.validate_token(&token).unwrap();
    assert_eq!(
        snapshot.env.get("CERT").map(String::as_str),
        Some("-----BEGIN-----\nabc\n-----END-----")
    );
}

/// Outputs written to $RUNBOOK_OUTPUT are reported, and files written to
/// $RUNBOOK_FILES land in the output directory
#[cfg(unix)]
#[tokio::test]
async fn test_outputs_and_captured_files() {
    let project = TestProject::new();
    let (sessions, engine) = engine();
    let token = sessions.create_session(&project.path).unwrap();
    let output_dir = project.path.join("generated");

    let snapshot = sessions.validate_token(&token).unwrap();
    let request = ExecRequest::new(
        "echo \"region=us-east-1\" >> \"$RUNBOOK_OUTPUT\"\n\
         mkdir -p \"$RUNBOOK_FILES/config\"\n\
         echo 'a = 1' > \"$RUNBOOK_FILES/config/app.toml\"",
    )
    .with_session(snapshot.exec_context())
    .with_file_capture(&output_dir);

    let events = engine.run_to_completion(request).await.unwrap();

    let outputs = events.iter().find_map(|e| match e {
        ExecEvent::Outputs { outputs } => Some(outputs.clone()),
        _ => None,
    });
    assert_eq!(
        outputs.unwrap().get("region").map(String::as_str),
        Some("us-east-1")
    );

    let captured = events.iter().find_map(|e| match e {
        ExecEvent::FilesCaptured { count, .. } => Some(*count),
        _ => None,
    });
    assert_eq!(captured, Some(1));
    assert_eq!(
        fs::read_to_string(output_dir.join("config/app.toml")).unwrap(),
        "a = 1\n"
    );

    let snapshot = sessions.validate_token(&token).unwrap();
    assert!(!snapshot.env.contains_key("RUNBOOK_OUTPUT"));
    assert!(!snapshot.env.contains_key("RUNBOOK_FILES"));
}
