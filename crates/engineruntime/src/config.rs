use serde::{Deserialize, Serialize};

/// Strings longer than this many bytes are replaced before the trace leaves
/// the engine.
pub const DEFAULT_MAX_VALUE_BYTES: usize = 2 * 1024 * 1024;

pub const DEFAULT_REDACTION_PLACEHOLDER: &str = "**REDACTED**";

/// Configuration for the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Truncation ceiling applied to every string in the returned trace.
    pub max_value_bytes: usize,
    /// Replaces connection values in censored step inputs.
    pub redaction_placeholder: String,
    pub event_buffer_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_value_bytes: DEFAULT_MAX_VALUE_BYTES,
            redaction_placeholder: DEFAULT_REDACTION_PLACEHOLDER.to_string(),
            event_buffer_size: 1000,
        }
    }
}
