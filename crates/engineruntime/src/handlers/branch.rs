use super::{fail, record, resolve_settings, ActionHandler, StepResult};
use crate::context::EngineContext;
use crate::evaluator::evaluate_conditions;
use crate::executor::{ChainOutput, FlowExecutor};
use async_trait::async_trait;
use enginecore::{
    Ancestors, BranchActionSpec, BranchSettings, EngineError, ExecutionState,
    StepError, StepOutput, StepOutputStatus, StepType,
};
use serde_json::{json, Value};
use std::time::Instant;

/// Evaluates the branch conditions and runs one of the two arms.
pub struct BranchHandler<'a> {
    spec: &'a BranchActionSpec,
}

impl<'a> BranchHandler<'a> {
    pub fn new(spec: &'a BranchActionSpec) -> Self {
        Self { spec }
    }

    /// Condition recorded by an earlier pass that did not finish.
    fn recorded_condition(&self, state: &ExecutionState, ancestors: &Ancestors) -> Option<bool> {
        state
            .get_step(&self.spec.name, ancestors)
            .filter(|output| {
                matches!(
                    output.status,
                    StepOutputStatus::Running | StepOutputStatus::Paused
                )
            })
            .and_then(|output| output.branch_output())
            .map(|branch| branch.condition)
    }

    async fn evaluate(
        &self,
        ctx: &EngineContext,
        state: &ExecutionState,
        ancestors: &Ancestors,
    ) -> Result<bool, StepError> {
        let resolved = resolve_settings(&self.spec.settings, ctx, state, ancestors, false).await?;
        let settings: BranchSettings = serde_json::from_value(resolved)
            .map_err(|e| StepError::Configuration(e.to_string()))?;
        evaluate_conditions(&settings.conditions)
    }
}

#[async_trait]
impl ActionHandler for BranchHandler<'_> {
    async fn init_step_output(
        &self,
        ctx: &EngineContext,
        state: &ExecutionState,
        ancestors: &Ancestors,
    ) -> Result<StepOutput, StepError> {
        let input = resolve_settings(&self.spec.settings, ctx, state, ancestors, true).await?;
        Ok(StepOutput::running(StepType::Branch, input))
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
                let output = StepOutput::running(StepType::Branch, Value::Null);
                return Ok(fail(state, name, ancestors, output, e, started));
            }
        };

        let condition = match self.recorded_condition(state, ancestors) {
            Some(condition) => condition,
            None => match self.evaluate(ctx, state, ancestors).await {
                Ok(condition) => condition,
                Err(e) => return Ok(fail(state, name, ancestors, output, e, started)),
            },
        };
        tracing::debug!("Branch {}{} evaluated to {}", ancestors, name, condition);

        let output = output.with_output(json!({ "condition": condition }));
        state.insert_step(name, ancestors, output.clone());

        let arm = if condition {
            self.spec.on_success_action.as_deref()
        } else {
            self.spec.on_failure_action.as_deref()
        };
        let chain = match arm {
            Some(first) => FlowExecutor::new(ctx).execute(first, state, ancestors).await?,
            None => ChainOutput::succeeded(),
        };

        let output = output
            .with_status(chain.verdict.status())
            .with_error_message(chain.verdict.error_message());
        Ok(record(state, name, ancestors, output, chain.verdict, started))
    }
}
