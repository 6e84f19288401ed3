use super::{fail, record, resolve_settings, ActionHandler, StepResult};
use crate::context::EngineContext;
use crate::executor::Verdict;
use async_trait::async_trait;
use enginecore::{
    Ancestors, CodeActionSpec, EngineError, ExecutionState, StepError, StepOutput,
    StepOutputStatus, StepType,
};
use serde_json::Value;
use std::time::Instant;

/// Runs a pre-compiled code module with the resolved `input` as parameters.
pub struct CodeHandler<'a> {
    spec: &'a CodeActionSpec,
}

impl<'a> CodeHandler<'a> {
    pub fn new(spec: &'a CodeActionSpec) -> Self {
        Self { spec }
    }

    async fn run_module(
        &self,
        ctx: &EngineContext,
        state: &ExecutionState,
        ancestors: &Ancestors,
    ) -> Result<Value, StepError> {
        let module = ctx
            .code_loader
            .load(&self.spec.name, self.spec.settings.artifact_id.as_deref())
            .ok_or_else(|| StepError::CodeModuleNotFound(self.spec.name.clone()))?;
        let params = resolve_settings(&self.spec.settings.input, ctx, state, ancestors, false).await?;
        module.code(params).await
    }
}

#[async_trait]
impl ActionHandler for CodeHandler<'_> {
    async fn init_step_output(
        &self,
        ctx: &EngineContext,
        state: &ExecutionState,
        ancestors: &Ancestors,
    ) -> Result<StepOutput, StepError> {
        let input = resolve_settings(&self.spec.settings, ctx, state, ancestors, true).await?;
        Ok(StepOutput::running(StepType::Code, input))
    }

    async fn execute(
        &self,
        ctx: &EngineContext,
        state: &mut ExecutionState,
        ancestors: &Ancestors,
    ) -> Result<StepResult, EngineError> {
        let started = Instant::now();
        let name = self.spec.name.as_str();
        let output = match self.init_step_output(ctx, state, ancestors).await {
            Ok(output) => output,
            Err(e) => {
                let output = StepOutput::running(StepType::Code, Value::Null);
                return Ok(fail(state, name, ancestors, output, e, started));
            }
        };

        match self.run_module(ctx, state, ancestors).await {
            Ok(value) => {
                let output = output
                    .with_output(value)
                    .with_status(StepOutputStatus::Succeeded);
                Ok(record(state, name, ancestors, output, Verdict::Succeeded, started))
            }
            Err(e) => Ok(fail(state, name, ancestors, output, e, started)),
        }
    }
}
