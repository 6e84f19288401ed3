use async_trait::async_trait;
use enginecore::{
    ActionContext, ActionOutput, Piece, PieceAction, PieceMetadata, StepError, StoreScope,
};
use serde_json::{json, Value};
use std::sync::Arc;

fn scope(ctx: &ActionContext) -> Result<StoreScope, StepError> {
    match ctx.props_value.get("scope") {
        None => Ok(StoreScope::default()),
        Some(value) => serde_json::from_value(value.clone())
            .map_err(|_| StepError::Configuration(format!("invalid store scope {}", value))),
    }
}

pub struct PutAction;

#[async_trait]
impl PieceAction for PutAction {
    fn name(&self) -> &str {
        "put"
    }

    async fn run(&self, ctx: ActionContext) -> Result<ActionOutput, StepError> {
        let key = ctx.require_str("key")?;
        let value = ctx.prop_or("value", Value::Null);
        ctx.store.put(key, value.clone(), scope(&ctx)?).await?;
        Ok(ActionOutput::new(json!({ "key": key, "value": value })))
    }
}

pub struct GetAction;

#[async_trait]
impl PieceAction for GetAction {
    fn name(&self) -> &str {
        "get"
    }

    async fn run(&self, ctx: ActionContext) -> Result<ActionOutput, StepError> {
        let key = ctx.require_str("key")?;
        let value = ctx.store.get(key, scope(&ctx)?).await?;
        Ok(ActionOutput::new(value.unwrap_or(Value::Null)))
    }
}

pub struct DeleteAction;

#[async_trait]
impl PieceAction for DeleteAction {
    fn name(&self) -> &str {
        "delete"
    }

    async fn run(&self, ctx: ActionContext) -> Result<ActionOutput, StepError> {
        let key = ctx.require_str("key")?;
        ctx.store.delete(key, scope(&ctx)?).await?;
        Ok(ActionOutput::new(json!({ "key": key })))
    }
}

/// Key-value storage scoped to the project or to the flow
pub struct StorePiece;

impl Piece for StorePiece {
    fn name(&self) -> &str {
        "store"
    }

    fn metadata(&self) -> PieceMetadata {
        PieceMetadata {
            display_name: "Storage".to_string(),
            description: "Store and read values between runs".to_string(),
            category: "core".to_string(),
        }
    }

    fn actions(&self) -> Vec<Arc<dyn PieceAction>> {
        vec![Arc::new(PutAction), Arc::new(GetAction), Arc::new(DeleteAction)]
    }
}
