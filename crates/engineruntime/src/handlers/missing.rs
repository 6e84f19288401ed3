use super::{fail, resolve_settings, ActionHandler, StepResult};
use crate::context::EngineContext;
use async_trait::async_trait;
use enginecore::{Action, Ancestors, EngineError, ExecutionState, StepError, StepOutput};
use serde_json::Value;
use std::time::Instant;

/// Handles `MISSING` actions and any action flagged invalid. Always fails.
pub struct MissingHandler<'a> {
    action: &'a Action,
}

impl<'a> MissingHandler<'a> {
    pub fn new(action: &'a Action) -> Self {
        Self { action }
    }
}

#[async_trait]
impl ActionHandler for MissingHandler<'_> {
    async fn init_step_output(
        &self,
        ctx: &EngineContext,
        state: &ExecutionState,
        ancestors: &Ancestors,
    ) -> Result<StepOutput, StepError> {
        let settings = self
            .action
            .settings_value()
            .map_err(|e| StepError::Configuration(e.to_string()))?;
        let input = resolve_settings(&settings, ctx, state, ancestors, true).await?;
        Ok(StepOutput::running(self.action.action_type(), input))
    }

    async fn execute(
        &self,
        ctx: &EngineContext,
        state: &mut ExecutionState,
        ancestors: &Ancestors,
    ) -> Result<StepResult, EngineError> {
        let started = Instant::now();
        let output = self
            .init_step_output(ctx, state, ancestors)
            .await
            .unwrap_or_else(|_| StepOutput::running(self.action.action_type(), Value::Null));
        let error = StepError::Configuration(format!(
            "action '{}' is missing or invalid",
            self.action.name()
        ));
        Ok(fail(state, self.action.name(), ancestors, output, error, started))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::Verdict;
    use crate::handlers::test_support::context;
    use enginecore::{MissingActionSpec, StepOutputStatus, StepType};
    use serde_json::json;

    #[tokio::test]
    async fn test_missing_action_fails() {
        let ctx = context();
        let action = Action::Missing(MissingActionSpec::new("ghost", json!({})));
        let mut state = ExecutionState::new();
        let root = Ancestors::root();

        let result = MissingHandler::new(&action)
            .execute(&ctx, &mut state, &root)
            .await
            .unwrap();

        assert_eq!(result.output.status, StepOutputStatus::Failed);
        assert_eq!(result.output.step_type, StepType::Missing);
        assert!(matches!(result.verdict, Verdict::Failed { ref step, .. } if step.name == "ghost"));
        assert_eq!(state.get_step("ghost", &root), Some(&result.output));
    }
}
