mod common;

use common::{engine, flow, loop_on, piece};
use enginecore::{Ancestors, EngineError, ExecutionState, PauseMetadata, StepOutputStatus};
use engineruntime::{ExecuteFlowOperation, ExecutionOutput};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

fn resume(output: &ExecutionOutput, flow: &enginecore::FlowVersion, payload: Value) -> ExecuteFlowOperation {
    ExecuteFlowOperation::resume(
        flow.clone(),
        uuid::Uuid::new_v4(),
        output.execution_state.clone(),
        payload,
    )
}

#[tokio::test]
async fn test_resume_never_reruns_finished_steps() {
    let (engine, counter) = engine();
    let flow = flow(vec![
        piece("a", "count", json!({})),
        piece("approval", "approve", json!({})),
        piece("c", "count", json!({"decision": "{{approval.approved}}"})),
    ]);

    let paused = engine
        .execute_flow(ExecuteFlowOperation::begin(flow.clone(), json!({})))
        .await
        .unwrap();

    let root = Ancestors::root();
    assert_eq!(paused.status, StepOutputStatus::Paused);
    assert_eq!(counter.runs(), 1);
    assert_eq!(
        paused.pause_metadata,
        Some(PauseMetadata::Webhook {
            request_id: "approve-approval".into(),
            response: json!({"waiting": true}),
        })
    );
    assert_eq!(
        paused.execution_state.get_step("approval", &root).unwrap().status,
        StepOutputStatus::Paused
    );

    let finished = engine
        .execute_flow(resume(&paused, &flow, json!({"approved": true})))
        .await
        .unwrap();

    assert_eq!(finished.status, StepOutputStatus::Succeeded);
    assert_eq!(counter.runs(), 2);

    let state = &finished.execution_state;
    assert_eq!(
        state.get_step("a", &root),
        paused.execution_state.get_step("a", &root)
    );
    assert_eq!(
        state.get_step("approval", &root).unwrap().output,
        Some(json!({"approved": true}))
    );
    assert_eq!(
        state.get_step("c", &root).unwrap().output,
        Some(json!({"run": 2, "props": {"decision": true}}))
    );

    let order: Vec<&str> = state.steps().map(|(key, _)| key.name.as_str()).collect();
    assert_eq!(order, vec!["trigger", "a", "approval", "c"]);
}

/// Serialized state with the wall-clock `duration` fields removed.
fn without_timings(state: &ExecutionState) -> Value {
    fn strip(value: &mut Value) {
        match value {
            Value::Object(map) => {
                map.remove("duration");
                map.values_mut().for_each(strip);
            }
            Value::Array(items) => items.iter_mut().for_each(strip),
            _ => {}
        }
    }
    let mut value = serde_json::to_value(state).unwrap();
    strip(&mut value);
    value
}

#[tokio::test]
async fn test_resuming_the_same_state_twice_gives_the_same_result() {
    let (engine, _) = engine();
    let flow = flow(vec![
        piece("a", "echo", json!({"from": "{{trigger.user}}"})),
        loop_on(
            "each",
            json!([1, 2]),
            vec![piece("inner", "echo", json!({"item": "{{each.item}}"}))],
        ),
        piece("approval", "approve", json!({})),
        piece("after", "echo", json!({"decision": "{{approval.approved}}"})),
    ]);

    let paused = engine
        .execute_flow(ExecuteFlowOperation::begin(flow.clone(), json!({"user": "ada"})))
        .await
        .unwrap();
    assert_eq!(paused.status, StepOutputStatus::Paused);

    let first = engine
        .execute_flow(resume(&paused, &flow, json!({"approved": true})))
        .await
        .unwrap();
    let second = engine
        .execute_flow(resume(&paused, &flow, json!({"approved": true})))
        .await
        .unwrap();

    assert_eq!(first.status, StepOutputStatus::Succeeded);
    assert_eq!(second.status, StepOutputStatus::Succeeded);
    assert_eq!(first.tasks, second.tasks);
    assert_eq!(
        without_timings(&first.execution_state),
        without_timings(&second.execution_state)
    );
    assert_eq!(
        second
            .execution_state
            .get_step("after", &Ancestors::root())
            .unwrap()
            .output,
        Some(json!({"decision": true}))
    );
}

#[tokio::test]
async fn test_resumed_state_survives_json() {
    let (engine, _) = engine();
    let flow = flow(vec![piece("approval", "approve", json!({}))]);

    let paused = engine
        .execute_flow(ExecuteFlowOperation::begin(flow.clone(), json!({"x": 1})))
        .await
        .unwrap();

    let persisted = serde_json::to_string(&paused.execution_state).unwrap();
    let restored: ExecutionState = serde_json::from_str(&persisted).unwrap();
    assert_eq!(restored, paused.execution_state);

    let operation: ExecuteFlowOperation = serde_json::from_value(json!({
        "flowVersion": flow,
        "flowRunId": uuid::Uuid::new_v4(),
        "executionType": "RESUME",
        "executionState": restored,
        "resumePayload": "ok"
    }))
    .unwrap();
    let finished = engine.execute_flow(operation).await.unwrap();

    assert_eq!(finished.status, StepOutputStatus::Succeeded);
}

#[tokio::test]
async fn test_loop_resumes_at_the_paused_iteration() {
    let (engine, counter) = engine();
    let flow = flow(vec![
        loop_on(
            "each",
            json!([1, 2]),
            vec![
                piece("tally", "count", json!({})),
                piece("approval", "approve", json!({})),
            ],
        ),
        piece("done", "echo", json!({"last": "{{each.item}}"})),
    ]);
    let root = Ancestors::root();

    let first = engine
        .execute_flow(ExecuteFlowOperation::begin(flow.clone(), json!({})))
        .await
        .unwrap();
    assert_eq!(first.status, StepOutputStatus::Paused);
    assert_eq!(counter.runs(), 1);

    let second = engine
        .execute_flow(resume(&first, &flow, json!("first")))
        .await
        .unwrap();
    assert_eq!(second.status, StepOutputStatus::Paused);
    assert_eq!(counter.runs(), 2);
    let scope = root.child("each", 0);
    assert_eq!(
        second.execution_state.get_step("approval", &scope).unwrap().output,
        Some(json!("first"))
    );

    let third = engine
        .execute_flow(resume(&second, &flow, json!("second")))
        .await
        .unwrap();
    assert_eq!(third.status, StepOutputStatus::Succeeded);
    assert_eq!(counter.runs(), 2);

    let each = third.execution_state.get_step("each", &root).unwrap();
    let iterations = each.loop_output().unwrap().iterations;
    assert_eq!(iterations.len(), 2);
    assert_eq!(iterations[0]["approval"].output, Some(json!("first")));
    assert_eq!(iterations[1]["approval"].output, Some(json!("second")));
    assert_eq!(
        third.execution_state.get_step("done", &root).unwrap().output,
        Some(json!({"last": 2}))
    );
}

#[tokio::test]
async fn test_resume_without_paused_step_is_rejected() {
    let (engine, _) = engine();
    let flow = flow(vec![piece("a", "echo", json!({}))]);

    let done = engine
        .execute_flow(ExecuteFlowOperation::begin(flow.clone(), json!({})))
        .await
        .unwrap();
    let err = engine
        .execute_flow(resume(&done, &flow, Value::Null))
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::Resume(_)));
}

#[tokio::test]
async fn test_resume_against_another_version_is_rejected() {
    let (engine, _) = engine();
    let original = flow(vec![piece("approval", "approve", json!({}))]);
    let other = flow(vec![piece("something_else", "approve", json!({}))]);

    let paused = engine
        .execute_flow(ExecuteFlowOperation::begin(original, json!({})))
        .await
        .unwrap();
    let err = engine
        .execute_flow(resume(&paused, &other, Value::Null))
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::Resume(ref message) if message.contains("approval")));
}
