use async_trait::async_trait;
use enginecore::{ActionContext, ActionOutput, Piece, PieceAction, PieceMetadata, StepError};
use serde_json::{json, Value};
use std::sync::Arc;

/// Logs its props and passes the message through
pub struct LogAction;

#[async_trait]
impl PieceAction for LogAction {
    fn name(&self) -> &str {
        "log"
    }

    fn display_name(&self) -> &str {
        "Log"
    }

    async fn run(&self, ctx: ActionContext) -> Result<ActionOutput, StepError> {
        let message = ctx
            .props_value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("(no message)")
            .to_string();

        tracing::info!(step = %ctx.step_name, "DEBUG: {}", message);
        for (key, value) in &ctx.props_value {
            tracing::debug!("  {}: {}", key, value);
        }

        Ok(ActionOutput::new(json!({ "message": message })))
    }
}

pub struct DebugPiece;

impl Piece for DebugPiece {
    fn name(&self) -> &str {
        "debug"
    }

    fn metadata(&self) -> PieceMetadata {
        PieceMetadata {
            display_name: "Debug".to_string(),
            description: "Logs input values for debugging".to_string(),
            category: "debug".to_string(),
        }
    }

    fn actions(&self) -> Vec<Arc<dyn PieceAction>> {
        vec![Arc::new(LogAction)]
    }
}
