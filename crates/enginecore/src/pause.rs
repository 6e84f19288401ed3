use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Whether a run starts from the trigger or continues a paused run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionType {
    #[default]
    Begin,
    Resume,
}

/// What a paused step is waiting for. The worker persists the execution
/// state and schedules the resume from this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PauseMetadata {
    #[serde(rename_all = "camelCase")]
    Delay { resume_date_time: DateTime<Utc> },
    #[serde(rename_all = "camelCase")]
    Webhook {
        request_id: String,
        #[serde(default)]
        response: Value,
    },
}

/// Response handed back to a synchronous webhook caller when a step stops
/// the flow early.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopResponse {
    #[serde(default = "default_stop_status")]
    pub status: u16,
    #[serde(default)]
    pub body: Value,
    #[serde(default)]
    pub headers: Map<String, Value>,
}

fn default_stop_status() -> u16 {
    200
}

impl Default for StopResponse {
    fn default() -> Self {
        Self {
            status: default_stop_status(),
            body: Value::Null,
            headers: Map::new(),
        }
    }
}
