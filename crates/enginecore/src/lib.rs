//! Core data model of the flow execution engine
//!
//! This crate provides the action tree, step outputs, execution state and the
//! contracts that pieces, code steps and connection providers implement. It
//! contains no execution logic.

mod action;
mod condition;
mod error;
mod events;
mod flow;
mod pause;
mod piece;
mod state;
mod step_output;
mod store;

pub use action::{
    Action, BranchActionSpec, BranchSettings, Chain, CodeActionSpec, CodeSettings,
    LoopOnItemsActionSpec, LoopOnItemsSettings, MissingActionSpec, PieceActionSpec,
    PieceSettings, StepSpec, StepType,
};
pub use condition::{BranchCondition, BranchOperator};
pub use error::{EngineError, FlowVersionError, StepError};
pub use events::{EventBus, ExecutionEvent, ExecutionHooks, NoopHooks};
pub use flow::{
    FlowId, FlowRunId, FlowVersion, FlowVersionId, PieceTriggerSettings, Trigger, TriggerSpec,
};
pub use pause::{ExecutionType, PauseMetadata, StopResponse};
pub use piece::{
    json_type_name, ActionContext, ActionOutput, CodeLoader, CodeModule, ConnectionProvider,
    FlowControl, Piece, PieceAction, PieceMetadata, PieceTrigger, TriggerContext,
};
pub use state::{Ancestors, ExecutionState, LoopIteration, StepKey};
pub use step_output::{
    BranchStepOutput, IterationOutputs, LoopStepOutput, StepOutput, StepOutputStatus,
};
pub use store::{InMemoryStore, ScopedStore, StoreBackend, StoreScope};

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
