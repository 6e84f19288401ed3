use async_trait::async_trait;
use chrono::{Duration, Utc};
use enginecore::{
    json_type_name, ActionContext, ActionOutput, ExecutionType, PauseMetadata, Piece,
    PieceAction, PieceMetadata, StepError,
};
use serde_json::json;
use std::sync::Arc;

/// Pause the run for a number of milliseconds. The worker schedules the
/// resume; the step completes when it comes back.
pub struct DelayAction;

impl DelayAction {
    fn delay_ms(ctx: &ActionContext) -> Result<i64, StepError> {
        let value = ctx.prop_or("delayMs", json!(1000));
        value
            .as_i64()
            .filter(|ms| *ms >= 0)
            .ok_or_else(|| StepError::InvalidInputType {
                field: "delayMs".to_string(),
                expected: "non-negative integer".to_string(),
                actual: json_type_name(&value).to_string(),
            })
    }
}

#[async_trait]
impl PieceAction for DelayAction {
    fn name(&self) -> &str {
        "delay_for"
    }

    fn display_name(&self) -> &str {
        "Delay For"
    }

    async fn run(&self, ctx: ActionContext) -> Result<ActionOutput, StepError> {
        match ctx.execution_type {
            ExecutionType::Begin => {
                let delay_ms = Self::delay_ms(&ctx)?;
                let resume_date_time = Duration::try_milliseconds(delay_ms)
                    .and_then(|delay| Utc::now().checked_add_signed(delay))
                    .ok_or_else(|| StepError::InvalidInputType {
                        field: "delayMs".to_string(),
                        expected: "delay within the representable date range".to_string(),
                        actual: delay_ms.to_string(),
                    })?;
                tracing::info!("Delaying {} until {}", ctx.step_name, resume_date_time);
                Ok(ActionOutput::new(json!({ "delayMs": delay_ms }))
                    .pause(PauseMetadata::Delay { resume_date_time }))
            }
            ExecutionType::Resume => Ok(ActionOutput::new(json!({
                "success": true,
                "resumedAt": Utc::now(),
            }))),
        }
    }
}

pub struct DelayPiece;

impl Piece for DelayPiece {
    fn name(&self) -> &str {
        "delay"
    }

    fn metadata(&self) -> PieceMetadata {
        PieceMetadata {
            display_name: "Delay".to_string(),
            description: "Delay execution for specified milliseconds".to_string(),
            category: "time".to_string(),
        }
    }

    fn actions(&self) -> Vec<Arc<dyn PieceAction>> {
        vec![Arc::new(DelayAction)]
    }
}
