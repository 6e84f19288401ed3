use crate::action::{Action, StepType};
use crate::FlowVersionError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use uuid::Uuid;

pub type FlowId = Uuid;
pub type FlowVersionId = Uuid;
pub type FlowRunId = Uuid;

fn default_valid() -> bool {
    true
}

/// Root step of a flow version. `S` is the variant's settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerSpec<S> {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default = "default_valid")]
    pub valid: bool,
    pub settings: S,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_action: Option<Box<Action>>,
}

impl<S> TriggerSpec<S> {
    pub fn new(name: impl Into<String>, settings: S) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
            valid: true,
            settings,
            next_action: None,
        }
    }

    pub fn then(mut self, next: Action) -> Self {
        self.next_action = Some(Box::new(next));
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PieceTriggerSettings {
    pub piece_name: String,
    #[serde(default)]
    pub piece_version: String,
    pub trigger_name: String,
    #[serde(default)]
    pub input: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Trigger {
    Empty(TriggerSpec<Value>),
    Webhook(TriggerSpec<Value>),
    PieceTrigger(TriggerSpec<PieceTriggerSettings>),
}

impl Trigger {
    pub fn name(&self) -> &str {
        match self {
            Trigger::Empty(t) | Trigger::Webhook(t) => &t.name,
            Trigger::PieceTrigger(t) => &t.name,
        }
    }

    pub fn trigger_type(&self) -> StepType {
        match self {
            Trigger::Empty(_) => StepType::Empty,
            Trigger::Webhook(_) => StepType::Webhook,
            Trigger::PieceTrigger(_) => StepType::PieceTrigger,
        }
    }

    pub fn next_action(&self) -> Option<&Action> {
        match self {
            Trigger::Empty(t) | Trigger::Webhook(t) => t.next_action.as_deref(),
            Trigger::PieceTrigger(t) => t.next_action.as_deref(),
        }
    }

    pub fn settings_value(&self) -> Result<Value, serde_json::Error> {
        match self {
            Trigger::Empty(t) | Trigger::Webhook(t) => Ok(t.settings.clone()),
            Trigger::PieceTrigger(t) => serde_json::to_value(&t.settings),
        }
    }
}

/// An immutable, published version of a flow: one trigger plus the action
/// tree hanging off it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowVersion {
    #[serde(default = "Uuid::new_v4")]
    pub id: FlowVersionId,
    #[serde(default = "Uuid::new_v4")]
    pub flow_id: FlowId,
    #[serde(default)]
    pub display_name: String,
    pub trigger: Trigger,
    #[serde(default = "default_valid")]
    pub valid: bool,
}

impl FlowVersion {
    pub fn new(display_name: impl Into<String>, trigger: Trigger) -> Self {
        Self {
            id: Uuid::new_v4(),
            flow_id: Uuid::new_v4(),
            display_name: display_name.into(),
            trigger,
            valid: true,
        }
    }

    pub fn first_action(&self) -> Option<&Action> {
        self.trigger.next_action()
    }

    /// Trigger name followed by every action name in walk order.
    pub fn step_names(&self) -> Vec<String> {
        let mut names = vec![self.trigger.name().to_string()];
        if let Some(first) = self.first_action() {
            names.extend(first.step_names());
        }
        names
    }

    pub fn find_action(&self, name: &str) -> Option<&Action> {
        self.first_action().and_then(|first| first.find(name))
    }

    /// Step names identify outputs in the execution state, so they must be
    /// unique across the whole tree.
    pub fn validate(&self) -> Result<(), FlowVersionError> {
        let mut seen = HashSet::new();
        for name in self.step_names() {
            if name.is_empty() {
                return Err(FlowVersionError::Invalid("step with empty name".into()));
            }
            if !seen.insert(name.clone()) {
                return Err(FlowVersionError::DuplicateStepName(name));
            }
        }
        Ok(())
    }
}
