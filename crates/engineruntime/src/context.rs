use crate::config::EngineConfig;
use crate::registry::PieceRegistry;
use crate::resolver::{collect_connection_names, ResolveScope, VariableResolver};
use enginecore::{
    Ancestors, CodeLoader, ConnectionProvider, ExecutionHooks, ExecutionState, ExecutionType,
    FlowId, FlowRunId, ScopedStore, StepError, StoreBackend,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Everything a handler needs for one flow run. Shared read-only by the
/// whole call tree; the execution state travels separately as `&mut`.
#[derive(Clone)]
pub struct EngineContext {
    pub flow_run_id: FlowRunId,
    pub flow_id: FlowId,
    pub execution_type: ExecutionType,
    pub resume_payload: Option<Value>,
    pub registry: Arc<PieceRegistry>,
    pub code_loader: Arc<dyn CodeLoader>,
    pub connections: Arc<dyn ConnectionProvider>,
    pub store: Arc<dyn StoreBackend>,
    pub hooks: Arc<dyn ExecutionHooks>,
    pub resolver: VariableResolver,
    pub config: EngineConfig,
}

impl EngineContext {
    /// Resolve `unresolved` against the state visible from `ancestors`.
    ///
    /// Connection values are fetched only when not censoring, so a censored
    /// resolution never holds a secret.
    pub async fn resolve(
        &self,
        unresolved: &Value,
        state: &ExecutionState,
        ancestors: &Ancestors,
        censor_connections: bool,
    ) -> Result<Value, StepError> {
        let mut connections = HashMap::new();
        if !censor_connections {
            for name in collect_connection_names(unresolved) {
                if let Some(value) = self.connections.get(&name).await? {
                    connections.insert(name, value);
                }
            }
        }

        let scope = ResolveScope {
            state,
            ancestors,
            connections: &connections,
        };
        Ok(self.resolver.resolve(unresolved, &scope, censor_connections))
    }

    pub fn scoped_store(&self) -> ScopedStore {
        ScopedStore::new(self.store.clone(), self.flow_id)
    }
}
