use crate::pause::{ExecutionType, PauseMetadata, StopResponse};
use crate::store::ScopedStore;
use crate::{FlowRunId, StepError};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

/// A named action exposed by a piece.
#[async_trait]
pub trait PieceAction: Send + Sync {
    /// Identifier referenced by `settings.actionName`.
    fn name(&self) -> &str;

    fn display_name(&self) -> &str {
        self.name()
    }

    /// Run the action with resolved properties. Errors become a FAILED step.
    async fn run(&self, ctx: ActionContext) -> Result<ActionOutput, StepError>;
}

/// Lifecycle hooks of a piece trigger.
#[async_trait]
pub trait PieceTrigger: Send + Sync {
    fn name(&self) -> &str;

    fn display_name(&self) -> &str {
        self.name()
    }

    async fn on_enable(&self, _ctx: TriggerContext) -> Result<(), StepError> {
        Ok(())
    }

    async fn on_disable(&self, _ctx: TriggerContext) -> Result<(), StepError> {
        Ok(())
    }

    /// Turn an incoming payload into trigger items.
    async fn run(&self, ctx: TriggerContext) -> Result<Vec<Value>, StepError>;

    /// Produce sample items for the editor. Defaults to `run`.
    async fn test(&self, ctx: TriggerContext) -> Result<Vec<Value>, StepError> {
        self.run(ctx).await
    }
}

/// An integration plugin: a named, versioned set of actions and triggers.
pub trait Piece: Send + Sync {
    fn name(&self) -> &str;

    fn version(&self) -> &str {
        "0.0.1"
    }

    fn metadata(&self) -> PieceMetadata {
        PieceMetadata::default()
    }

    fn actions(&self) -> Vec<Arc<dyn PieceAction>>;

    fn triggers(&self) -> Vec<Arc<dyn PieceTrigger>> {
        Vec::new()
    }

    fn action(&self, name: &str) -> Option<Arc<dyn PieceAction>> {
        self.actions().into_iter().find(|a| a.name() == name)
    }

    fn trigger(&self, name: &str) -> Option<Arc<dyn PieceTrigger>> {
        self.triggers().into_iter().find(|t| t.name() == name)
    }
}

#[derive(Debug, Clone)]
pub struct PieceMetadata {
    pub display_name: String,
    pub description: String,
    pub category: String,
}

impl Default for PieceMetadata {
    fn default() -> Self {
        Self {
            display_name: String::new(),
            description: String::new(),
            category: "general".to_string(),
        }
    }
}

/// Context passed to [`PieceAction::run`].
#[derive(Clone)]
pub struct ActionContext {
    pub flow_run_id: FlowRunId,
    pub step_name: String,
    /// Resolved `input` settings, excluding `auth`.
    pub props_value: Map<String, Value>,
    /// Resolved connection value referenced by `input.auth`.
    pub auth: Option<Value>,
    pub store: ScopedStore,
    pub execution_type: ExecutionType,
    pub resume_payload: Option<Value>,
}

impl ActionContext {
    /// Get required property or return error
    pub fn require_prop(&self, name: &str) -> Result<&Value, StepError> {
        self.props_value
            .get(name)
            .ok_or_else(|| StepError::MissingInput(name.to_string()))
    }

    pub fn require_str(&self, name: &str) -> Result<&str, StepError> {
        let value = self.require_prop(name)?;
        value.as_str().ok_or_else(|| StepError::InvalidInputType {
            field: name.to_string(),
            expected: "string".to_string(),
            actual: json_type_name(value).to_string(),
        })
    }

    /// Get property with default
    pub fn prop_or(&self, name: &str, default: Value) -> Value {
        self.props_value.get(name).cloned().unwrap_or(default)
    }
}

pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Context passed to piece trigger hooks.
#[derive(Clone)]
pub struct TriggerContext {
    pub props_value: Map<String, Value>,
    pub auth: Option<Value>,
    pub store: ScopedStore,
    /// Incoming payload for `run`; `None` for the other hooks.
    pub payload: Option<Value>,
}

/// How an action wants the run to continue after it returns.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowControl {
    Pause(PauseMetadata),
    Stop(StopResponse),
}

/// Result of a piece action or code module.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionOutput {
    pub value: Value,
    pub control: Option<FlowControl>,
}

impl ActionOutput {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            control: None,
        }
    }

    /// Suspend the run after this step.
    pub fn pause(mut self, metadata: PauseMetadata) -> Self {
        self.control = Some(FlowControl::Pause(metadata));
        self
    }

    /// End the run early after this step.
    pub fn stop(mut self, response: StopResponse) -> Self {
        self.control = Some(FlowControl::Stop(response));
        self
    }
}

impl Default for ActionOutput {
    fn default() -> Self {
        Self::new(Value::Null)
    }
}

/// A pre-compiled code step.
#[async_trait]
pub trait CodeModule: Send + Sync {
    async fn code(&self, params: Value) -> Result<Value, StepError>;
}

/// Locates the compiled module of a code step.
pub trait CodeLoader: Send + Sync {
    fn load(&self, step_name: &str, artifact_id: Option<&str>) -> Option<Arc<dyn CodeModule>>;
}

/// Source of connection secrets referenced as `{{connections.<name>}}`.
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    async fn get(&self, name: &str) -> Result<Option<Value>, StepError>;
}
