use serde_json::{json, Value};
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn engine(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_engine"))
        .args(args)
        .output()
        .expect("failed to run engine binary")
}

fn write_json(dir: &TempDir, name: &str, value: &Value) -> String {
    let path = dir.path().join(name);
    std::fs::write(&path, serde_json::to_string_pretty(value).unwrap()).unwrap();
    path.to_string_lossy().into_owned()
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

fn approval_flow() -> Value {
    json!({
        "displayName": "cli approval",
        "trigger": {
            "type": "WEBHOOK",
            "name": "trigger",
            "settings": {},
            "nextAction": {
                "type": "PIECE",
                "name": "ask",
                "settings": {
                    "pieceName": "flow_control",
                    "pieceVersion": "0.0.1",
                    "actionName": "wait_for_approval",
                    "input": {}
                },
                "nextAction": {
                    "type": "PIECE",
                    "name": "log",
                    "settings": {
                        "pieceName": "debug",
                        "pieceVersion": "0.0.1",
                        "actionName": "log",
                        "input": {"message": "approved={{ask.approved}} by {{trigger.user}}"}
                    }
                }
            }
        }
    })
}

#[test]
fn test_validate_accepts_example_flow() {
    let dir = TempDir::new().unwrap();
    let flow_path = dir.path().join("flow.json");
    let flow = flow_path.to_str().unwrap();

    let init = engine(&["init", "--output", flow]);
    assert!(init.status.success());

    let validate = engine(&["validate", flow]);
    assert!(validate.status.success(), "{}", String::from_utf8_lossy(&validate.stderr));
}

#[test]
fn test_validate_rejects_unknown_action() {
    let dir = TempDir::new().unwrap();
    let mut flow = approval_flow();
    flow["trigger"]["nextAction"]["settings"]["actionName"] = json!("teleport");
    let path = write_json(&dir, "flow.json", &flow);

    let validate = engine(&["validate", &path]);
    assert!(!validate.status.success());
    assert!(String::from_utf8_lossy(&validate.stderr).contains("teleport"));
}

#[test]
fn test_run_pause_and_resume_through_files() {
    let dir = TempDir::new().unwrap();
    let flow = write_json(&dir, "flow.json", &approval_flow());
    let first_out = dir.path().join("first.json");
    let second_out = dir.path().join("second.json");

    let run = engine(&[
        "run",
        "--file",
        &flow,
        "--payload",
        r#"{"user": "grace"}"#,
        "--output",
        first_out.to_str().unwrap(),
    ]);
    assert!(run.status.success(), "{}", String::from_utf8_lossy(&run.stderr));
    let first = read_json(&first_out);
    assert_eq!(first["status"], json!("PAUSED"));
    assert_eq!(first["pauseMetadata"]["type"], json!("WEBHOOK"));

    let resume = engine(&[
        "resume",
        "--file",
        &flow,
        "--state",
        first_out.to_str().unwrap(),
        "--payload",
        r#"{"approved": true}"#,
        "--output",
        second_out.to_str().unwrap(),
    ]);
    assert!(resume.status.success(), "{}", String::from_utf8_lossy(&resume.stderr));
    let second = read_json(&second_out);
    assert_eq!(second["status"], json!("SUCCEEDED"));

    let log = second["executionState"]["steps"]
        .as_array()
        .unwrap()
        .iter()
        .find(|entry| entry["name"] == json!("log"))
        .unwrap();
    assert_eq!(log["output"]["output"]["message"], json!("approved=true by grace"));
}

#[test]
fn test_pieces_lists_the_standard_library() {
    let output = engine(&["pieces"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for piece in ["debug", "delay", "flow_control", "http", "json", "store"] {
        assert!(stdout.contains(piece), "missing {}", piece);
    }
}
