use async_trait::async_trait;
use enginecore::{
    json_type_name, ActionContext, ActionOutput, Piece, PieceAction, PieceMetadata, StepError,
};
use serde_json::{Map, Value};
use std::sync::Arc;

/// HTTP request action
pub struct SendRequestAction {
    client: reqwest::Client,
}

impl SendRequestAction {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for SendRequestAction {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PieceAction for SendRequestAction {
    fn name(&self) -> &str {
        "send_request"
    }

    fn display_name(&self) -> &str {
        "Send HTTP Request"
    }

    async fn run(&self, ctx: ActionContext) -> Result<ActionOutput, StepError> {
        let url = ctx.require_str("url")?;
        let method_value = ctx.prop_or("method", Value::String("GET".to_string()));
        let method = method_value.as_str().unwrap_or("GET").to_uppercase();

        tracing::info!("{} {}", method, url);

        let mut request = match method.as_str() {
            "GET" => self.client.get(url),
            "POST" => self.client.post(url),
            "PUT" => self.client.put(url),
            "PATCH" => self.client.patch(url),
            "DELETE" => self.client.delete(url),
            _ => return Err(StepError::Configuration(format!("Unsupported method: {}", method))),
        };

        match ctx.props_value.get("body") {
            None | Some(Value::Null) => {}
            Some(Value::String(text)) => request = request.body(text.clone()),
            Some(json) => request = request.json(json),
        }

        match ctx.props_value.get("headers") {
            None | Some(Value::Null) => {}
            Some(Value::Object(headers)) => {
                for (key, value) in headers {
                    if let Some(val_str) = value.as_str() {
                        request = request.header(key, val_str);
                    }
                }
            }
            Some(other) => {
                return Err(StepError::InvalidInputType {
                    field: "headers".to_string(),
                    expected: "object".to_string(),
                    actual: json_type_name(other).to_string(),
                })
            }
        }

        // A string connection is a bearer token; an object may carry `token`.
        let token = match &ctx.auth {
            Some(Value::String(token)) => Some(token.as_str()),
            Some(Value::Object(auth)) => auth.get("token").and_then(Value::as_str),
            _ => None,
        };
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| StepError::ExecutionFailed(format!("HTTP request failed: {}", e)))?;

        let status = response.status().as_u16();
        let headers: Map<String, Value> = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_str().unwrap_or("").to_string())))
            .collect();

        let body_text = response
            .text()
            .await
            .map_err(|e| StepError::ExecutionFailed(format!("Failed to read response: {}", e)))?;
        let body = serde_json::from_str(&body_text).unwrap_or(Value::String(body_text));

        tracing::info!("Response status: {}", status);

        let mut output = Map::new();
        output.insert("status".to_string(), Value::from(status));
        output.insert("headers".to_string(), Value::Object(headers));
        output.insert("body".to_string(), body);
        Ok(ActionOutput::new(output))
    }
}

/// Holds one `SendRequestAction` so every step shares its client.
pub struct HttpPiece {
    send_request: Arc<SendRequestAction>,
}

impl HttpPiece {
    pub fn new() -> Self {
        Self {
            send_request: Arc::new(SendRequestAction::new()),
        }
    }
}

impl Default for HttpPiece {
    fn default() -> Self {
        Self::new()
    }
}

impl Piece for HttpPiece {
    fn name(&self) -> &str {
        "http"
    }

    fn metadata(&self) -> PieceMetadata {
        PieceMetadata {
            display_name: "HTTP".to_string(),
            description: "Make HTTP requests".to_string(),
            category: "http".to_string(),
        }
    }

    fn actions(&self) -> Vec<Arc<dyn PieceAction>> {
        let send_request: Arc<dyn PieceAction> = self.send_request.clone();
        vec![send_request]
    }
}
