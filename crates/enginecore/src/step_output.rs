use crate::action::StepType;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepOutputStatus {
    Running,
    Succeeded,
    Failed,
    Paused,
    Stopped,
}

impl StepOutputStatus {
    /// A finished step is never executed again within the same run, even
    /// across a resume. RUNNING and PAUSED steps are re-entered.
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            StepOutputStatus::Succeeded | StepOutputStatus::Failed | StepOutputStatus::Stopped
        )
    }
}

/// Recorded result of one step execution.
///
/// Updates go through the `with_*` methods, which consume the value and hand
/// back a new one; an output already inserted into the execution state is
/// never changed in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepOutput {
    #[serde(rename = "type")]
    pub step_type: StepType,
    pub status: StepOutputStatus,
    /// Resolved settings with connection values censored.
    #[serde(default)]
    pub input: Value,
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub output: Option<Value>,
    /// Milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// A present `null` output stays `Some(Value::Null)`; only an absent field
/// means no output.
fn deserialize_present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

impl StepOutput {
    pub fn running(step_type: StepType, input: Value) -> Self {
        Self {
            step_type,
            status: StepOutputStatus::Running,
            input,
            output: None,
            duration: None,
            error_message: None,
        }
    }

    pub fn with_status(self, status: StepOutputStatus) -> Self {
        Self { status, ..self }
    }

    pub fn with_output(self, output: Value) -> Self {
        Self {
            output: Some(output),
            ..self
        }
    }

    pub fn with_duration(self, duration_ms: u64) -> Self {
        Self {
            duration: Some(duration_ms),
            ..self
        }
    }

    /// Mark the step FAILED with the given message.
    pub fn with_error(self, message: impl Into<String>) -> Self {
        Self {
            status: StepOutputStatus::Failed,
            error_message: Some(message.into()),
            ..self
        }
    }

    pub fn with_error_message(self, message: Option<String>) -> Self {
        Self {
            error_message: message,
            ..self
        }
    }

    pub fn branch_output(&self) -> Option<BranchStepOutput> {
        self.output
            .as_ref()
            .and_then(|o| serde_json::from_value(o.clone()).ok())
    }

    pub fn loop_output(&self) -> Option<LoopStepOutput> {
        self.output
            .as_ref()
            .and_then(|o| serde_json::from_value(o.clone()).ok())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchStepOutput {
    pub condition: bool,
}

/// Child outputs of one loop iteration, keyed by step name.
pub type IterationOutputs = BTreeMap<String, StepOutput>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoopStepOutput {
    #[serde(default)]
    pub item: Value,
    /// 1-based position of `item`, zero before the first iteration.
    #[serde(default)]
    pub index: usize,
    #[serde(default)]
    pub iterations: Vec<IterationOutputs>,
}

impl LoopStepOutput {
    pub fn with_item_and_index(self, item: Value, index: usize) -> Self {
        Self {
            item,
            index,
            ..self
        }
    }

    /// Record the outputs of `iteration`. A new iteration is appended; an
    /// existing one (resume) is replaced by its newer snapshot.
    pub fn with_iteration(mut self, iteration: usize, outputs: IterationOutputs) -> Self {
        if iteration < self.iterations.len() {
            self.iterations[iteration] = outputs;
        } else {
            self.iterations.push(outputs);
        }
        self
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
