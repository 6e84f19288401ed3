#![allow(dead_code)]

use async_trait::async_trait;
use enginecore::{
    ActionContext, ActionOutput, ExecutionType, FlowVersion, PauseMetadata, Piece, PieceAction,
    StepError, StopResponse,
};
use engineruntime::{Engine, PieceRegistry};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Initialize tracing for tests
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Counts how often each of its actions really ran.
#[derive(Default)]
pub struct Counter {
    runs: AtomicUsize,
}

impl Counter {
    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

struct CountAction(Arc<Counter>);

#[async_trait]
impl PieceAction for CountAction {
    fn name(&self) -> &str {
        "count"
    }

    async fn run(&self, ctx: ActionContext) -> Result<ActionOutput, StepError> {
        let n = self.0.runs.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(ActionOutput::new(json!({ "run": n, "props": ctx.props_value })))
    }
}

struct EchoAction;

#[async_trait]
impl PieceAction for EchoAction {
    fn name(&self) -> &str {
        "echo"
    }

    async fn run(&self, ctx: ActionContext) -> Result<ActionOutput, StepError> {
        Ok(ActionOutput::new(Value::Object(ctx.props_value)))
    }
}

struct FailAction;

#[async_trait]
impl PieceAction for FailAction {
    fn name(&self) -> &str {
        "fail"
    }

    async fn run(&self, _ctx: ActionContext) -> Result<ActionOutput, StepError> {
        Err(StepError::ExecutionFailed("boom".into()))
    }
}

/// Pauses on BEGIN and completes with the resume payload on RESUME.
struct ApproveAction;

#[async_trait]
impl PieceAction for ApproveAction {
    fn name(&self) -> &str {
        "approve"
    }

    async fn run(&self, ctx: ActionContext) -> Result<ActionOutput, StepError> {
        match ctx.execution_type {
            ExecutionType::Begin => Ok(ActionOutput::default().pause(PauseMetadata::Webhook {
                request_id: format!("approve-{}", ctx.step_name),
                response: json!({"waiting": true}),
            })),
            ExecutionType::Resume => Ok(ActionOutput::new(
                ctx.resume_payload.unwrap_or(Value::Null),
            )),
        }
    }
}

struct StopAction;

#[async_trait]
impl PieceAction for StopAction {
    fn name(&self) -> &str {
        "stop"
    }

    async fn run(&self, ctx: ActionContext) -> Result<ActionOutput, StepError> {
        let body = ctx.prop_or("body", Value::Null);
        Ok(ActionOutput::new(body.clone()).stop(StopResponse {
            status: 201,
            body,
            headers: Default::default(),
        }))
    }
}

pub struct TestPiece {
    counter: Arc<Counter>,
}

impl Piece for TestPiece {
    fn name(&self) -> &str {
        "test"
    }

    fn actions(&self) -> Vec<Arc<dyn PieceAction>> {
        vec![
            Arc::new(CountAction(self.counter.clone())),
            Arc::new(EchoAction),
            Arc::new(FailAction),
            Arc::new(ApproveAction),
            Arc::new(StopAction),
        ]
    }
}

pub fn engine() -> (Engine, Arc<Counter>) {
    init_tracing();
    let counter = Arc::new(Counter::default());
    let mut registry = PieceRegistry::new();
    registry.register(Arc::new(TestPiece {
        counter: counter.clone(),
    }));
    (Engine::new().with_registry(Arc::new(registry)), counter)
}

pub fn piece(name: &str, action: &str, input: Value) -> Value {
    json!({
        "type": "PIECE",
        "name": name,
        "displayName": name,
        "settings": {
            "pieceName": "test",
            "pieceVersion": "0.0.1",
            "actionName": action,
            "input": input
        }
    })
}

pub fn loop_on(name: &str, items: Value, body: Vec<Value>) -> Value {
    let mut step = json!({
        "type": "LOOP_ON_ITEMS",
        "name": name,
        "settings": { "items": items }
    });
    if let Some(first) = chain(body) {
        step["firstLoopAction"] = first;
    }
    step
}

pub fn branch(name: &str, conditions: Value, on_success: Vec<Value>, on_failure: Vec<Value>) -> Value {
    let mut step = json!({
        "type": "BRANCH",
        "name": name,
        "settings": { "conditions": conditions }
    });
    if let Some(first) = chain(on_success) {
        step["onSuccessAction"] = first;
    }
    if let Some(first) = chain(on_failure) {
        step["onFailureAction"] = first;
    }
    step
}

/// Link steps through `nextAction`.
pub fn chain(steps: Vec<Value>) -> Option<Value> {
    steps.into_iter().rev().fold(None, |next, mut step| {
        if let Some(next) = next {
            step["nextAction"] = next;
        }
        Some(step)
    })
}

/// Flow version with a webhook trigger named `trigger`.
pub fn flow(steps: Vec<Value>) -> FlowVersion {
    let mut trigger = json!({ "type": "WEBHOOK", "name": "trigger", "settings": {} });
    if let Some(first) = chain(steps) {
        trigger["nextAction"] = first;
    }
    serde_json::from_value(json!({ "displayName": "test flow", "trigger": trigger }))
        .expect("valid flow version")
}
