//! Standard piece library
//!
//! Collection of built-in pieces for common operations

mod debug;
mod flow_control;
mod http;
mod store;
mod time;
mod transform;

pub use debug::{DebugPiece, LogAction};
pub use flow_control::{FlowControlPiece, StopFlowAction, WaitForApprovalAction};
pub use http::{HttpPiece, SendRequestAction};
pub use store::{DeleteAction, GetAction, PutAction, StorePiece};
pub use time::{DelayAction, DelayPiece};
pub use transform::{JsonParseAction, JsonPiece, JsonStringifyAction, SplitItemsTrigger};
use engineruntime::PieceRegistry;

use std::sync::Arc;

/// Register all standard pieces with a registry
pub fn register_all(registry: &mut PieceRegistry) {
    registry.register(Arc::new(DebugPiece));
    registry.register(Arc::new(DelayPiece));
    registry.register(Arc::new(FlowControlPiece));
    registry.register(Arc::new(HttpPiece::new()));
    registry.register(Arc::new(JsonPiece));
    registry.register(Arc::new(StorePiece));
}
