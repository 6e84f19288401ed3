use super::{fail, record, resolve_settings, ActionHandler, StepResult};
use crate::context::EngineContext;
use crate::executor::Verdict;
use async_trait::async_trait;
use enginecore::{
    ActionContext, ActionOutput, Ancestors, EngineError, ExecutionState, ExecutionType,
    FlowControl, PieceActionSpec, StepError, StepKey, StepOutput, StepOutputStatus, StepType,
};
use serde_json::Value;
use std::time::Instant;

const AUTH_PROP: &str = "auth";

/// Runs one action of an installed piece.
pub struct PieceHandler<'a> {
    spec: &'a PieceActionSpec,
}

impl<'a> PieceHandler<'a> {
    pub fn new(spec: &'a PieceActionSpec) -> Self {
        Self { spec }
    }

    /// Only a step that paused in the previous pass is resumed; everything
    /// else begins, even within a resumed run.
    fn execution_type(&self, ctx: &EngineContext, prior: Option<StepOutputStatus>) -> ExecutionType {
        match (ctx.execution_type, prior) {
            (ExecutionType::Resume, Some(StepOutputStatus::Paused)) => ExecutionType::Resume,
            _ => ExecutionType::Begin,
        }
    }

    async fn run_action(
        &self,
        ctx: &EngineContext,
        state: &ExecutionState,
        ancestors: &Ancestors,
        execution_type: ExecutionType,
    ) -> Result<ActionOutput, StepError> {
        let settings = &self.spec.settings;
        let action_name = settings.action_name.as_deref().ok_or_else(|| {
            StepError::Configuration(format!("step '{}' has no actionName", self.spec.name))
        })?;
        let action = ctx.registry.get_action(&settings.piece_name, action_name)?;

        let mut props_value = match resolve_settings(&settings.input, ctx, state, ancestors, false).await? {
            Value::Object(map) => map,
            _ => return Err(StepError::Configuration("input must be an object".into())),
        };
        let auth = props_value.remove(AUTH_PROP);

        let resume_payload = match execution_type {
            ExecutionType::Resume => ctx.resume_payload.clone(),
            ExecutionType::Begin => None,
        };

        tracing::debug!(
            "Running {}/{} for step {}{} ({:?})",
            settings.piece_name,
            action_name,
            ancestors,
            self.spec.name,
            execution_type
        );
        action
            .run(ActionContext {
                flow_run_id: ctx.flow_run_id,
                step_name: self.spec.name.clone(),
                props_value,
                auth,
                store: ctx.scoped_store(),
                execution_type,
                resume_payload,
            })
            .await
    }
}

#[async_trait]
impl ActionHandler for PieceHandler<'_> {
    async fn init_step_output(
        &self,
        ctx: &EngineContext,
        state: &ExecutionState,
        ancestors: &Ancestors,
    ) -> Result<StepOutput, StepError> {
        let input = resolve_settings(&self.spec.settings, ctx, state, ancestors, true).await?;
        Ok(StepOutput::running(StepType::Piece, input))
    }

    async fn execute(
        &self,
        ctx: &EngineContext,
        state: &mut ExecutionState,
        ancestors: &Ancestors,
    ) -> Result<StepResult, EngineError> {
        let started = Instant::now();
        let name = self.spec.name.as_str();
        let prior = state.get_step(name, ancestors).map(|output| output.status);
        let execution_type = self.execution_type(ctx, prior);

        let output = match self.init_step_output(ctx, state, ancestors).await {
            Ok(output) => output,
            Err(e) => {
                let output = StepOutput::running(StepType::Piece, Value::Null);
                return Ok(fail(state, name, ancestors, output, e, started));
            }
        };

        let action_output = match self.run_action(ctx, state, ancestors, execution_type).await {
            Ok(action_output) => action_output,
            Err(e) => return Ok(fail(state, name, ancestors, output, e, started)),
        };

        let step = StepKey::new(name, ancestors.clone());
        let output = output.with_output(action_output.value);
        let (status, verdict) = match action_output.control {
            None => (StepOutputStatus::Succeeded, Verdict::Succeeded),
            Some(FlowControl::Pause(metadata)) => {
                tracing::info!("Step {} paused the run", step);
                (StepOutputStatus::Paused, Verdict::Paused { step, metadata })
            }
            Some(FlowControl::Stop(response)) => {
                tracing::info!("Step {} stopped the run", step);
                (StepOutputStatus::Stopped, Verdict::Stopped { step, response })
            }
        };
        Ok(record(state, name, ancestors, output.with_status(status), verdict, started))
    }
}
