use async_trait::async_trait;
use enginecore::{
    ActionContext, ActionOutput, ExecutionType, PauseMetadata, Piece, PieceAction,
    PieceMetadata, StepError, StopResponse,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use uuid::Uuid;

/// Pause until an external caller answers the approval webhook.
pub struct WaitForApprovalAction;

#[async_trait]
impl PieceAction for WaitForApprovalAction {
    fn name(&self) -> &str {
        "wait_for_approval"
    }

    fn display_name(&self) -> &str {
        "Wait for Approval"
    }

    async fn run(&self, ctx: ActionContext) -> Result<ActionOutput, StepError> {
        match ctx.execution_type {
            ExecutionType::Begin => {
                let request_id = Uuid::new_v4().to_string();
                tracing::info!("Step {} waiting for approval {}", ctx.step_name, request_id);
                Ok(ActionOutput::new(json!({ "requestId": request_id })).pause(
                    PauseMetadata::Webhook {
                        request_id,
                        response: ctx.prop_or("response", Value::Null),
                    },
                ))
            }
            ExecutionType::Resume => {
                let payload = ctx.resume_payload.unwrap_or(Value::Null);
                let approved = payload
                    .get("approved")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                Ok(ActionOutput::new(json!({
                    "approved": approved,
                    "payload": payload,
                })))
            }
        }
    }
}

/// End the run and answer the webhook caller.
pub struct StopFlowAction;

#[async_trait]
impl PieceAction for StopFlowAction {
    fn name(&self) -> &str {
        "stop_flow"
    }

    fn display_name(&self) -> &str {
        "Stop Flow"
    }

    async fn run(&self, ctx: ActionContext) -> Result<ActionOutput, StepError> {
        let status = match ctx.props_value.get("status") {
            None => 200,
            Some(value) => value
                .as_u64()
                .and_then(|s| u16::try_from(s).ok())
                .ok_or_else(|| StepError::Configuration(format!("invalid status {}", value)))?,
        };
        let headers = match ctx.prop_or("headers", Value::Object(Map::new())) {
            Value::Object(headers) => headers,
            other => {
                return Err(StepError::InvalidInputType {
                    field: "headers".to_string(),
                    expected: "object".to_string(),
                    actual: enginecore::json_type_name(&other).to_string(),
                })
            }
        };
        let response = StopResponse {
            status,
            body: ctx.prop_or("body", Value::Null),
            headers,
        };

        Ok(ActionOutput::new(json!({ "status": status, "body": response.body })).stop(response))
    }
}

pub struct FlowControlPiece;

impl Piece for FlowControlPiece {
    fn name(&self) -> &str {
        "flow_control"
    }

    fn metadata(&self) -> PieceMetadata {
        PieceMetadata {
            display_name: "Flow Control".to_string(),
            description: "Pause for approval or stop the run early".to_string(),
            category: "core".to_string(),
        }
    }

    fn actions(&self) -> Vec<Arc<dyn PieceAction>> {
        vec![Arc::new(WaitForApprovalAction), Arc::new(StopFlowAction)]
    }
}
