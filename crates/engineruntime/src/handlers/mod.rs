//! One handler per action type.
//!
//! Every handler records its final [`StepOutput`] in the execution state
//! before returning. Errors raised inside a step never escape the run: they
//! become a FAILED output and a [`Verdict::Failed`] naming the step.

mod branch;
mod code;
mod loop_on_items;
mod missing;
mod piece;

pub use branch::BranchHandler;
pub use code::CodeHandler;
pub use loop_on_items::LoopOnItemsHandler;
pub use missing::MissingHandler;
pub use piece::PieceHandler;

use crate::context::EngineContext;
use crate::executor::Verdict;
use async_trait::async_trait;
use enginecore::{
    Action, Ancestors, EngineError, ExecutionState, StepError, StepKey, StepOutput,
};
use serde::Serialize;
use serde_json::Value;
use std::fmt::Display;
use std::time::Instant;

/// Outcome of a single step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    pub output: StepOutput,
    pub verdict: Verdict,
}

#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// RUNNING output whose input is the step settings resolved with
    /// connection values censored.
    async fn init_step_output(
        &self,
        ctx: &EngineContext,
        state: &ExecutionState,
        ancestors: &Ancestors,
    ) -> Result<StepOutput, StepError>;

    async fn execute(
        &self,
        ctx: &EngineContext,
        state: &mut ExecutionState,
        ancestors: &Ancestors,
    ) -> Result<StepResult, EngineError>;
}

/// Pick the handler for `action`. Invalid actions of any type are handled
/// as missing.
pub fn handler_for(action: &Action) -> Box<dyn ActionHandler + '_> {
    if !action.is_valid() {
        return Box::new(MissingHandler::new(action));
    }
    match action {
        Action::Code(spec) => Box::new(CodeHandler::new(spec)),
        Action::Piece(spec) => Box::new(PieceHandler::new(spec)),
        Action::LoopOnItems(spec) => Box::new(LoopOnItemsHandler::new(spec)),
        Action::Branch(spec) => Box::new(BranchHandler::new(spec)),
        Action::Missing(_) => Box::new(MissingHandler::new(action)),
    }
}

/// Resolve step settings against the visible state. With `censor` set the
/// result is fit for the trace.
pub(crate) async fn resolve_settings<S: Serialize + Sync>(
    settings: &S,
    ctx: &EngineContext,
    state: &ExecutionState,
    ancestors: &Ancestors,
    censor: bool,
) -> Result<Value, StepError> {
    let raw =
        serde_json::to_value(settings).map_err(|e| StepError::Configuration(e.to_string()))?;
    ctx.resolve(&raw, state, ancestors, censor).await
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

/// Store the final output of a step and pair it with its verdict.
pub(crate) fn record(
    state: &mut ExecutionState,
    name: &str,
    ancestors: &Ancestors,
    output: StepOutput,
    verdict: Verdict,
    started: Instant,
) -> StepResult {
    let output = output.with_duration(elapsed_ms(started));
    state.insert_step(name, ancestors, output.clone());
    StepResult { output, verdict }
}

pub(crate) fn fail(
    state: &mut ExecutionState,
    name: &str,
    ancestors: &Ancestors,
    output: StepOutput,
    error: impl Display,
    started: Instant,
) -> StepResult {
    let error_message = error.to_string();
    tracing::warn!("Step {}{} failed: {}", ancestors, name, error_message);
    let verdict = Verdict::Failed {
        step: StepKey::new(name, ancestors.clone()),
        error_message: error_message.clone(),
    };
    record(
        state,
        name,
        ancestors,
        output.with_error(error_message),
        verdict,
        started,
    )
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::config::EngineConfig;
    use crate::context::EngineContext;
    use crate::registry::{CodeRegistry, PieceRegistry, StaticConnections};
    use crate::resolver::VariableResolver;
    use enginecore::{ExecutionType, InMemoryStore, NoopHooks};
    use std::sync::Arc;
    use uuid::Uuid;

    pub fn context_with(registry: PieceRegistry, code: CodeRegistry) -> EngineContext {
        let config = EngineConfig::default();
        EngineContext {
            flow_run_id: Uuid::new_v4(),
            flow_id: Uuid::new_v4(),
            execution_type: ExecutionType::Begin,
            resume_payload: None,
            registry: Arc::new(registry),
            code_loader: Arc::new(code),
            connections: Arc::new(StaticConnections::default().with("slack", "xoxb-secret".into())),
            store: Arc::new(InMemoryStore::new()),
            hooks: Arc::new(NoopHooks),
            resolver: VariableResolver::new(config.redaction_placeholder.clone()),
            config,
        }
    }

    pub fn context() -> EngineContext {
        context_with(PieceRegistry::new(), CodeRegistry::new())
    }
}
