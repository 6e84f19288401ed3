use async_trait::async_trait;
use enginecore::{
    ActionContext, ActionOutput, Piece, PieceAction, PieceMetadata, PieceTrigger, StepError,
    TriggerContext,
};
use serde_json::{json, Value};
use std::sync::Arc;

/// Parse JSON string to Value
pub struct JsonParseAction;

#[async_trait]
impl PieceAction for JsonParseAction {
    fn name(&self) -> &str {
        "parse"
    }

    async fn run(&self, ctx: ActionContext) -> Result<ActionOutput, StepError> {
        let input = ctx.require_str("json")?;
        let parsed: Value = serde_json::from_str(input)
            .map_err(|e| StepError::ExecutionFailed(format!("JSON parse error: {}", e)))?;
        Ok(ActionOutput::new(json!({ "parsed": parsed })))
    }
}

/// Stringify Value to JSON
pub struct JsonStringifyAction;

#[async_trait]
impl PieceAction for JsonStringifyAction {
    fn name(&self) -> &str {
        "stringify"
    }

    async fn run(&self, ctx: ActionContext) -> Result<ActionOutput, StepError> {
        let value = ctx.require_prop("value")?;
        let pretty = ctx.prop_or("pretty", json!(false)).as_bool().unwrap_or(false);
        let text = if pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        }
        .map_err(|e| StepError::ExecutionFailed(format!("JSON stringify error: {}", e)))?;
        Ok(ActionOutput::new(json!({ "json": text })))
    }
}

/// Emits one item per element of an array payload.
pub struct SplitItemsTrigger;

#[async_trait]
impl PieceTrigger for SplitItemsTrigger {
    fn name(&self) -> &str {
        "split_items"
    }

    async fn run(&self, ctx: TriggerContext) -> Result<Vec<Value>, StepError> {
        let field = ctx.props_value.get("field").and_then(Value::as_str);
        let payload = ctx.payload.unwrap_or(Value::Null);
        let items = match field {
            Some(field) => payload.get(field).cloned().unwrap_or(Value::Null),
            None => payload,
        };
        Ok(match items {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            single => vec![single],
        })
    }

    async fn test(&self, _ctx: TriggerContext) -> Result<Vec<Value>, StepError> {
        Ok(vec![json!({ "sample": true })])
    }
}

pub struct JsonPiece;

impl Piece for JsonPiece {
    fn name(&self) -> &str {
        "json"
    }

    fn metadata(&self) -> PieceMetadata {
        PieceMetadata {
            display_name: "JSON".to_string(),
            description: "Parse, stringify and split JSON values".to_string(),
            category: "transform".to_string(),
        }
    }

    fn actions(&self) -> Vec<Arc<dyn PieceAction>> {
        vec![Arc::new(JsonParseAction), Arc::new(JsonStringifyAction)]
    }

    fn triggers(&self) -> Vec<Arc<dyn PieceTrigger>> {
        vec![Arc::new(SplitItemsTrigger)]
    }
}
