use crate::context::EngineContext;
use enginecore::{
    Ancestors, ExecutionState, StepError, StepOutput, StepOutputStatus, Trigger, TriggerContext,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const AUTH_PROP: &str = "auth";

/// Lifecycle hook of a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerHookType {
    OnEnable,
    OnDisable,
    Run,
    Test,
}

/// Runs trigger hooks and turns their result into trigger items.
pub struct TriggerHookRunner<'c> {
    ctx: &'c EngineContext,
}

impl<'c> TriggerHookRunner<'c> {
    pub fn new(ctx: &'c EngineContext) -> Self {
        Self { ctx }
    }

    /// Items produced by `hook`. Enable and disable hooks produce none.
    pub async fn run(
        &self,
        trigger: &Trigger,
        hook: TriggerHookType,
        payload: Option<Value>,
    ) -> Result<Vec<Value>, StepError> {
        match trigger {
            Trigger::Empty(_) => Ok(Vec::new()),
            Trigger::Webhook(_) => Ok(match hook {
                TriggerHookType::Run | TriggerHookType::Test => {
                    vec![payload.unwrap_or(Value::Null)]
                }
                TriggerHookType::OnEnable | TriggerHookType::OnDisable => Vec::new(),
            }),
            Trigger::PieceTrigger(spec) => {
                let settings = &spec.settings;
                let piece_trigger = self
                    .ctx
                    .registry
                    .get_trigger(&settings.piece_name, &settings.trigger_name)?;

                let unresolved = Value::Object(settings.input.clone());
                let mut props_value = match self
                    .ctx
                    .resolve(&unresolved, &ExecutionState::new(), &Ancestors::root(), false)
                    .await?
                {
                    Value::Object(map) => map,
                    _ => return Err(StepError::Configuration("input must be an object".into())),
                };
                let auth = props_value.remove(AUTH_PROP);
                let trigger_ctx = TriggerContext {
                    props_value,
                    auth,
                    store: self.ctx.scoped_store(),
                    payload,
                };

                tracing::debug!(
                    "Running {:?} hook of {}/{}",
                    hook,
                    settings.piece_name,
                    settings.trigger_name
                );
                match hook {
                    TriggerHookType::OnEnable => {
                        piece_trigger.on_enable(trigger_ctx).await.map(|_| Vec::new())
                    }
                    TriggerHookType::OnDisable => {
                        piece_trigger.on_disable(trigger_ctx).await.map(|_| Vec::new())
                    }
                    TriggerHookType::Run => piece_trigger.run(trigger_ctx).await,
                    TriggerHookType::Test => piece_trigger.test(trigger_ctx).await,
                }
            }
        }
    }

    /// Trigger settings resolved for the trace.
    pub async fn censored_input(&self, trigger: &Trigger) -> Result<Value, StepError> {
        let settings = trigger
            .settings_value()
            .map_err(|e| StepError::Configuration(e.to_string()))?;
        self.ctx
            .resolve(&settings, &ExecutionState::new(), &Ancestors::root(), true)
            .await
    }
}

/// SUCCEEDED trigger step whose output is the payload that started the run.
pub fn payload_step_output(trigger: &Trigger, input: Value, payload: Value) -> StepOutput {
    StepOutput::running(trigger.trigger_type(), input)
        .with_output(payload)
        .with_status(StepOutputStatus::Succeeded)
        .with_duration(0)
}

/// SUCCEEDED trigger step holding every item a hook produced.
pub fn items_step_output(trigger: &Trigger, input: Value, items: &[Value]) -> StepOutput {
    payload_step_output(trigger, input, Value::Array(items.to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::context_with;
    use crate::registry::{CodeRegistry, PieceRegistry};
    use async_trait::async_trait;
    use enginecore::{
        Piece, PieceAction, PieceTrigger, PieceTriggerSettings, StepType, TriggerSpec,
    };
    use serde_json::{json, Map};
    use std::sync::Arc;

    struct NewRows;

    #[async_trait]
    impl PieceTrigger for NewRows {
        fn name(&self) -> &str {
            "new_rows"
        }

        async fn run(&self, ctx: TriggerContext) -> Result<Vec<Value>, StepError> {
            let rows = ctx.payload.unwrap_or(Value::Null);
            Ok(rows.as_array().cloned().unwrap_or_default())
        }

        async fn test(&self, ctx: TriggerContext) -> Result<Vec<Value>, StepError> {
            Ok(vec![json!({"sheet": ctx.props_value.get("sheet").cloned(), "auth": ctx.auth})])
        }
    }

    struct Sheets;

    impl Piece for Sheets {
        fn name(&self) -> &str {
            "sheets"
        }

        fn actions(&self) -> Vec<Arc<dyn PieceAction>> {
            Vec::new()
        }

        fn triggers(&self) -> Vec<Arc<dyn PieceTrigger>> {
            vec![Arc::new(NewRows)]
        }
    }

    fn piece_trigger() -> Trigger {
        let mut input = Map::new();
        input.insert("sheet".into(), json!("Leads"));
        input.insert("auth".into(), json!("{{connections.slack}}"));
        Trigger::PieceTrigger(TriggerSpec::new(
            "trigger",
            PieceTriggerSettings {
                piece_name: "sheets".into(),
                piece_version: "0.0.1".into(),
                trigger_name: "new_rows".into(),
                input,
            },
        ))
    }

    fn ctx() -> EngineContext {
        let mut registry = PieceRegistry::new();
        registry.register(Arc::new(Sheets));
        context_with(registry, CodeRegistry::new())
    }

    #[tokio::test]
    async fn test_webhook_and_empty_triggers() {
        let ctx = ctx();
        let runner = TriggerHookRunner::new(&ctx);
        let webhook = Trigger::Webhook(TriggerSpec::new("trigger", json!({})));
        let empty = Trigger::Empty(TriggerSpec::new("trigger", json!({})));

        let items = runner
            .run(&webhook, TriggerHookType::Run, Some(json!({"id": 7})))
            .await
            .unwrap();
        assert_eq!(items, vec![json!({"id": 7})]);
        assert!(runner
            .run(&webhook, TriggerHookType::OnEnable, None)
            .await
            .unwrap()
            .is_empty());
        assert!(runner
            .run(&empty, TriggerHookType::Run, Some(json!(1)))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_piece_trigger_hooks() {
        let ctx = ctx();
        let runner = TriggerHookRunner::new(&ctx);
        let trigger = piece_trigger();

        let items = runner
            .run(&trigger, TriggerHookType::Run, Some(json!([{"row": 1}, {"row": 2}])))
            .await
            .unwrap();
        assert_eq!(items.len(), 2);

        let sample = runner.run(&trigger, TriggerHookType::Test, None).await.unwrap();
        assert_eq!(sample, vec![json!({"sheet": "Leads", "auth": "xoxb-secret"})]);

        let enabled = runner.run(&trigger, TriggerHookType::OnEnable, None).await.unwrap();
        assert!(enabled.is_empty());
    }

    #[tokio::test]
    async fn test_trigger_step_output_is_censored() {
        let ctx = ctx();
        let runner = TriggerHookRunner::new(&ctx);
        let trigger = piece_trigger();

        let input = runner.censored_input(&trigger).await.unwrap();
        let output = items_step_output(&trigger, input, &[json!({"row": 1})]);

        assert_eq!(output.step_type, StepType::PieceTrigger);
        assert_eq!(output.status, StepOutputStatus::Succeeded);
        assert_eq!(output.input["input"]["auth"], json!("**REDACTED**"));
        assert_eq!(output.output, Some(json!([{"row": 1}])));
    }

    #[tokio::test]
    async fn test_unknown_trigger_is_an_error() {
        let ctx = context_with(PieceRegistry::new(), CodeRegistry::new());
        let runner = TriggerHookRunner::new(&ctx);

        let err = runner
            .run(&piece_trigger(), TriggerHookType::Run, None)
            .await
            .unwrap_err();
        assert_eq!(err, StepError::PieceNotFound("sheets".into()));
    }
}
