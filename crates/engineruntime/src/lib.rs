//! Flow execution runtime
//!
//! This crate resolves step inputs, runs the action handlers, walks action
//! chains with pause/resume and stop semantics, and exposes the
//! `EXECUTE_FLOW` entry point through [`Engine`].

mod config;
mod context;
mod engine;
mod evaluator;
mod executor;
mod handlers;
mod log_serializer;
mod registry;
mod resolver;
mod trigger;

pub use config::{EngineConfig, DEFAULT_MAX_VALUE_BYTES, DEFAULT_REDACTION_PLACEHOLDER};
pub use context::EngineContext;
pub use engine::{
    Engine, ExecuteFlowOperation, ExecutionInput, ExecutionOutput, TriggerHookOperation,
    TriggerHookOutput,
};
pub use evaluator::{evaluate_condition, evaluate_conditions, parse_string_to_number, NumericOperand};
pub use executor::{ChainOutput, FlowExecutor, Verdict};
pub use handlers::{
    handler_for, ActionHandler, BranchHandler, CodeHandler, LoopOnItemsHandler, MissingHandler,
    PieceHandler, StepResult,
};
pub use log_serializer::{
    truncate_execution_state, truncate_step_output, truncate_value, TRUNCATION_PLACEHOLDER,
};
pub use registry::{CodeRegistry, PieceRegistry, StaticConnections};
pub use resolver::{collect_connection_names, ResolveScope, VariableResolver};
pub use trigger::{items_step_output, payload_step_output, TriggerHookRunner, TriggerHookType};
