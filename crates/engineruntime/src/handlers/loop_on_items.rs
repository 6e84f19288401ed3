use super::{fail, record, resolve_settings, ActionHandler, StepResult};
use crate::context::EngineContext;
use crate::executor::{ChainOutput, FlowExecutor, Verdict};
use async_trait::async_trait;
use enginecore::{
    json_type_name, Ancestors, EngineError, ExecutionState, LoopOnItemsActionSpec, StepError,
    StepOutput, StepType,
};
use serde_json::Value;
use std::time::Instant;

/// Runs the loop body once per item, each iteration in its own scope.
pub struct LoopOnItemsHandler<'a> {
    spec: &'a LoopOnItemsActionSpec,
}

impl<'a> LoopOnItemsHandler<'a> {
    pub fn new(spec: &'a LoopOnItemsActionSpec) -> Self {
        Self { spec }
    }

    async fn resolve_items(
        &self,
        ctx: &EngineContext,
        state: &ExecutionState,
        ancestors: &Ancestors,
    ) -> Result<Vec<Value>, StepError> {
        match resolve_settings(&self.spec.settings.items, ctx, state, ancestors, false).await? {
            Value::Array(items) => Ok(items),
            other => Err(StepError::InvalidInputType {
                field: "items".to_string(),
                expected: "array".to_string(),
                actual: json_type_name(&other).to_string(),
            }),
        }
    }
}

#[async_trait]
impl ActionHandler for LoopOnItemsHandler<'_> {
    async fn init_step_output(
        &self,
        ctx: &EngineContext,
        state: &ExecutionState,
        ancestors: &Ancestors,
    ) -> Result<StepOutput, StepError> {
        let input = resolve_settings(&self.spec.settings, ctx, state, ancestors, true).await?;
        Ok(StepOutput::running(StepType::LoopOnItems, input))
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
                let output = StepOutput::running(StepType::LoopOnItems, Value::Null);
                return Ok(fail(state, name, ancestors, output, e, started));
            }
        };
        let items = match self.resolve_items(ctx, state, ancestors).await {
            Ok(items) => items,
            Err(e) => return Ok(fail(state, name, ancestors, output, e, started)),
        };

        // An unfinished record means this is a resume: continue from the
        // last iteration it reached.
        let mut loop_output = state
            .get_step(name, ancestors)
            .filter(|prior| !prior.status.is_finished())
            .and_then(|prior| prior.loop_output())
            .unwrap_or_default();
        let first_iteration = loop_output.iterations.len().saturating_sub(1);

        let mut verdict = Verdict::Succeeded;
        for (i, item) in items.iter().enumerate().skip(first_iteration) {
            loop_output = loop_output.with_item_and_index(item.clone(), i + 1);
            state.insert_step(
                name,
                ancestors,
                output.clone().with_output(loop_output.to_value()),
            );

            let scope = ancestors.child(name, i);
            let chain = match self.spec.first_loop_action.as_deref() {
                Some(first) => FlowExecutor::new(ctx).execute(first, state, &scope).await?,
                None => ChainOutput::succeeded(),
            };
            loop_output = loop_output.with_iteration(i, state.children_of(&scope));

            if !chain.verdict.is_succeeded() {
                tracing::debug!("Loop {}{} halted in iteration {}", ancestors, name, i);
                verdict = chain.verdict;
                break;
            }
        }

        let output = output
            .with_output(loop_output.to_value())
            .with_status(verdict.status())
            .with_error_message(verdict.error_message());
        Ok(record(state, name, ancestors, output, verdict, started))
    }
}
