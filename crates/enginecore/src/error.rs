use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Step error: {0}")]
    Step(#[from] StepError),

    #[error("Flow version error: {0}")]
    FlowVersion(#[from] FlowVersionError),

    /// The resume request does not match the persisted execution state.
    #[error("Resume error: {0}")]
    Resume(String),

    /// The execution state is internally inconsistent.
    #[error("Corrupt execution state: {0}")]
    CorruptState(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised inside a single step. The handlers turn these into a
/// FAILED step output instead of letting them escape the run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StepError {
    #[error("Missing required input: {0}")]
    MissingInput(String),

    #[error("Invalid input type for '{field}': expected {expected}, got {actual}")]
    InvalidInputType {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Piece not found: {0}")]
    PieceNotFound(String),

    #[error("Action '{action}' not found in piece '{piece}'")]
    ActionNotFound { piece: String, action: String },

    #[error("Trigger '{trigger}' not found in piece '{piece}'")]
    TriggerNotFound { piece: String, trigger: String },

    #[error("Code module not found for step '{0}'")]
    CodeModuleNotFound(String),

    #[error("Unknown branch operator: {0}")]
    UnknownOperator(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FlowVersionError {
    #[error("Invalid flow version: {0}")]
    Invalid(String),

    #[error("Duplicate step name: {0}")]
    DuplicateStepName(String),
}
