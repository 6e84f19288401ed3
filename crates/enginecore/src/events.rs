use crate::flow::{FlowRunId, FlowVersionId};
use crate::state::StepKey;
use crate::step_output::{StepOutput, StepOutputStatus};
use crate::action::StepType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Events emitted during a flow run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ExecutionEvent {
    FlowStarted {
        flow_run_id: FlowRunId,
        flow_version_id: FlowVersionId,
        timestamp: DateTime<Utc>,
    },
    FlowFinished {
        flow_run_id: FlowRunId,
        status: StepOutputStatus,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    StepStarted {
        flow_run_id: FlowRunId,
        step: StepKey,
        step_type: StepType,
        timestamp: DateTime<Utc>,
    },
    StepFinished {
        flow_run_id: FlowRunId,
        step: StepKey,
        status: StepOutputStatus,
        duration_ms: u64,
        error_message: Option<String>,
        timestamp: DateTime<Utc>,
    },
}

/// Observer around a flow run. Passed explicitly to the executor so each
/// environment (CLI, worker, tests) picks its own behaviour.
pub trait ExecutionHooks: Send + Sync {
    fn on_flow_started(&self, _flow_run_id: FlowRunId, _flow_version_id: FlowVersionId) {}

    fn on_step_started(&self, _flow_run_id: FlowRunId, _step: &StepKey, _step_type: StepType) {}

    fn on_step_finished(&self, _flow_run_id: FlowRunId, _step: &StepKey, _output: &StepOutput) {}

    fn on_flow_finished(&self, _flow_run_id: FlowRunId, _status: StepOutputStatus, _duration_ms: u64) {}
}

/// Hooks that do nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

impl ExecutionHooks for NoopHooks {}

/// Broadcast bus for execution events
pub struct EventBus {
    sender: broadcast::Sender<ExecutionEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: ExecutionEvent) {
        let _ = self.sender.send(event);
    }
}

impl ExecutionHooks for EventBus {
    fn on_flow_started(&self, flow_run_id: FlowRunId, flow_version_id: FlowVersionId) {
        self.emit(ExecutionEvent::FlowStarted {
            flow_run_id,
            flow_version_id,
            timestamp: Utc::now(),
        });
    }

    fn on_step_started(&self, flow_run_id: FlowRunId, step: &StepKey, step_type: StepType) {
        self.emit(ExecutionEvent::StepStarted {
            flow_run_id,
            step: step.clone(),
            step_type,
            timestamp: Utc::now(),
        });
    }

    fn on_step_finished(&self, flow_run_id: FlowRunId, step: &StepKey, output: &StepOutput) {
        self.emit(ExecutionEvent::StepFinished {
            flow_run_id,
            step: step.clone(),
            status: output.status,
            duration_ms: output.duration.unwrap_or_default(),
            error_message: output.error_message.clone(),
            timestamp: Utc::now(),
        });
    }

    fn on_flow_finished(&self, flow_run_id: FlowRunId, status: StepOutputStatus, duration_ms: u64) {
        self.emit(ExecutionEvent::FlowFinished {
            flow_run_id,
            status,
            duration_ms,
            timestamp: Utc::now(),
        });
    }
}
