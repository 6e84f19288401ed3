use crate::config::EngineConfig;
use crate::context::EngineContext;
use crate::executor::{ChainOutput, FlowExecutor, Verdict};
use crate::log_serializer::{truncate_execution_state, truncate_step_output};
use crate::registry::{CodeRegistry, PieceRegistry, StaticConnections};
use crate::resolver::VariableResolver;
use crate::trigger::{items_step_output, payload_step_output, TriggerHookRunner, TriggerHookType};
use enginecore::{
    Ancestors, CodeLoader, ConnectionProvider, EngineError, ExecutionHooks, ExecutionState,
    ExecutionType, FlowId, FlowRunId, FlowVersion, InMemoryStore, LoopIteration, NoopHooks,
    PauseMetadata, StepKey, StepOutput, StepOutputStatus, StopResponse, StoreBackend,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

/// How a run starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "executionType", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionInput {
    #[serde(rename_all = "camelCase")]
    Begin {
        #[serde(default)]
        trigger_payload: Value,
    },
    /// Continue a paused run from the state the worker persisted.
    #[serde(rename_all = "camelCase")]
    Resume {
        execution_state: ExecutionState,
        #[serde(default)]
        resume_payload: Value,
    },
}

/// `EXECUTE_FLOW` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteFlowOperation {
    pub flow_version: FlowVersion,
    #[serde(default = "Uuid::new_v4")]
    pub flow_run_id: FlowRunId,
    #[serde(flatten)]
    pub input: ExecutionInput,
}

impl ExecuteFlowOperation {
    pub fn begin(flow_version: FlowVersion, trigger_payload: Value) -> Self {
        Self {
            flow_version,
            flow_run_id: Uuid::new_v4(),
            input: ExecutionInput::Begin { trigger_payload },
        }
    }

    pub fn resume(
        flow_version: FlowVersion,
        flow_run_id: FlowRunId,
        execution_state: ExecutionState,
        resume_payload: Value,
    ) -> Self {
        Self {
            flow_version,
            flow_run_id,
            input: ExecutionInput::Resume {
                execution_state,
                resume_payload,
            },
        }
    }
}

/// Result of one pass over a flow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionOutput {
    pub status: StepOutputStatus,
    /// Trace with oversized strings truncated.
    pub execution_state: ExecutionState,
    /// Sum of the recorded step durations, across earlier passes too.
    pub duration: u64,
    /// Number of action steps recorded in the trace.
    pub tasks: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<StepKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pause_metadata: Option<PauseMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_response: Option<StopResponse>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerHookOperation {
    pub flow_version: FlowVersion,
    pub hook_type: TriggerHookType,
    #[serde(default)]
    pub payload: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerHookOutput {
    pub items: Vec<Value>,
    pub step_output: StepOutput,
}

/// Entry point of the engine. Holds the collaborators shared by every run;
/// each run gets its own execution state.
pub struct Engine {
    registry: Arc<PieceRegistry>,
    code_loader: Arc<dyn CodeLoader>,
    connections: Arc<dyn ConnectionProvider>,
    store: Arc<dyn StoreBackend>,
    hooks: Arc<dyn ExecutionHooks>,
    config: EngineConfig,
}

impl Engine {
    /// Create an engine with default settings
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            registry: Arc::new(PieceRegistry::new()),
            code_loader: Arc::new(CodeRegistry::new()),
            connections: Arc::new(StaticConnections::default()),
            store: Arc::new(InMemoryStore::new()),
            hooks: Arc::new(NoopHooks),
            config,
        }
    }

    pub fn with_registry(mut self, registry: Arc<PieceRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_code_loader(mut self, code_loader: Arc<dyn CodeLoader>) -> Self {
        self.code_loader = code_loader;
        self
    }

    pub fn with_connections(mut self, connections: Arc<dyn ConnectionProvider>) -> Self {
        self.connections = connections;
        self
    }

    pub fn with_store(mut self, store: Arc<dyn StoreBackend>) -> Self {
        self.store = store;
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn ExecutionHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Get access to the piece registry
    pub fn registry(&self) -> &Arc<PieceRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn context(
        &self,
        flow_run_id: FlowRunId,
        flow_id: FlowId,
        execution_type: ExecutionType,
        resume_payload: Option<Value>,
    ) -> EngineContext {
        EngineContext {
            flow_run_id,
            flow_id,
            execution_type,
            resume_payload,
            registry: self.registry.clone(),
            code_loader: self.code_loader.clone(),
            connections: self.connections.clone(),
            store: self.store.clone(),
            hooks: self.hooks.clone(),
            resolver: VariableResolver::new(self.config.redaction_placeholder.clone()),
            config: self.config.clone(),
        }
    }

    /// Run a flow version until it finishes, pauses or stops.
    pub async fn execute_flow(
        &self,
        operation: ExecuteFlowOperation,
    ) -> Result<ExecutionOutput, EngineError> {
        let ExecuteFlowOperation {
            flow_version,
            flow_run_id,
            input,
        } = operation;
        flow_version.validate()?;

        let root = Ancestors::root();
        let (ctx, mut state) = match input {
            ExecutionInput::Begin { trigger_payload } => {
                let ctx = self.context(flow_run_id, flow_version.flow_id, ExecutionType::Begin, None);
                let trigger = &flow_version.trigger;
                let input = TriggerHookRunner::new(&ctx).censored_input(trigger).await?;
                let mut state = ExecutionState::new();
                state.insert_step(
                    trigger.name(),
                    &root,
                    payload_step_output(trigger, input, trigger_payload),
                );
                (ctx, state)
            }
            ExecutionInput::Resume {
                execution_state,
                resume_payload,
            } => {
                check_resumable(&flow_version, &execution_state)?;
                let ctx = self.context(
                    flow_run_id,
                    flow_version.flow_id,
                    ExecutionType::Resume,
                    Some(resume_payload),
                );
                (ctx, execution_state)
            }
        };

        tracing::info!(
            "Executing flow run {} ({:?}) of version {}",
            flow_run_id,
            ctx.execution_type,
            flow_version.id
        );
        self.hooks.on_flow_started(flow_run_id, flow_version.id);

        let chain = match flow_version.first_action() {
            Some(first) => FlowExecutor::new(&ctx).execute(first, &mut state, &root).await?,
            None => ChainOutput::succeeded(),
        };

        let status = chain.verdict.status();
        self.hooks.on_flow_finished(flow_run_id, status, chain.duration_ms);
        tracing::info!(
            "Flow run {} finished as {:?} in {}ms",
            flow_run_id,
            status,
            chain.duration_ms
        );

        let tasks = state
            .steps()
            .filter(|(_, output)| !output.step_type.is_trigger())
            .count();
        let mut output = ExecutionOutput {
            status,
            execution_state: truncate_execution_state(state, self.config.max_value_bytes),
            duration: chain.duration_ms,
            tasks,
            error_message: None,
            failed_step: None,
            pause_metadata: None,
            stop_response: None,
        };
        match chain.verdict {
            Verdict::Succeeded => {}
            Verdict::Failed {
                step,
                error_message,
            } => {
                output.error_message = Some(error_message);
                output.failed_step = Some(step);
            }
            Verdict::Paused { metadata, .. } => output.pause_metadata = Some(metadata),
            Verdict::Stopped { response, .. } => output.stop_response = Some(response),
        }
        Ok(output)
    }

    /// Run one lifecycle hook of the flow's trigger.
    pub async fn execute_trigger_hook(
        &self,
        operation: TriggerHookOperation,
    ) -> Result<TriggerHookOutput, EngineError> {
        let ctx = self.context(
            Uuid::new_v4(),
            operation.flow_version.flow_id,
            ExecutionType::Begin,
            None,
        );
        let trigger = &operation.flow_version.trigger;
        let runner = TriggerHookRunner::new(&ctx);

        let items = runner
            .run(trigger, operation.hook_type, operation.payload)
            .await?;
        tracing::debug!(
            "Trigger {} produced {} item(s) for {:?}",
            trigger.name(),
            items.len(),
            operation.hook_type
        );
        let input = runner.censored_input(trigger).await?;
        let step_output = truncate_step_output(
            items_step_output(trigger, input, &items),
            self.config.max_value_bytes,
        );
        Ok(TriggerHookOutput { items, step_output })
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

/// A resumed state must belong to this flow version and be waiting on a
/// paused step.
fn check_resumable(flow_version: &FlowVersion, state: &ExecutionState) -> Result<(), EngineError> {
    if state.paused_steps().is_empty() {
        return Err(EngineError::Resume(
            "execution state has no paused step".to_string(),
        ));
    }

    let known: HashSet<String> = flow_version.step_names().into_iter().collect();
    for (key, _) in state.steps() {
        if !known.contains(&key.name) {
            return Err(EngineError::Resume(format!(
                "step '{}' is not part of flow version {}",
                key.name, flow_version.id
            )));
        }
        for LoopIteration(loop_name, _) in key.ancestors.iter() {
            if !known.contains(loop_name) {
                return Err(EngineError::CorruptState(format!(
                    "step '{}' is nested under unknown loop '{}'",
                    key.name, loop_name
                )));
            }
        }
    }
    Ok(())
}
