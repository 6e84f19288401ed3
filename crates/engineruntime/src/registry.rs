use async_trait::async_trait;
use enginecore::{
    CodeLoader, CodeModule, ConnectionProvider, Piece, PieceAction, PieceMetadata, PieceTrigger,
    StepError,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of installed pieces
pub struct PieceRegistry {
    pieces: HashMap<String, Arc<dyn Piece>>,
}

impl PieceRegistry {
    pub fn new() -> Self {
        Self {
            pieces: HashMap::new(),
        }
    }

    /// Register a piece, replacing any earlier piece with the same name
    pub fn register(&mut self, piece: Arc<dyn Piece>) {
        let name = piece.name().to_string();
        tracing::info!("Registering piece: {}@{}", name, piece.version());
        self.pieces.insert(name, piece);
    }

    pub fn get(&self, piece_name: &str) -> Result<Arc<dyn Piece>, StepError> {
        self.pieces
            .get(piece_name)
            .cloned()
            .ok_or_else(|| StepError::PieceNotFound(piece_name.to_string()))
    }

    pub fn get_action(
        &self,
        piece_name: &str,
        action_name: &str,
    ) -> Result<Arc<dyn PieceAction>, StepError> {
        self.get(piece_name)?
            .action(action_name)
            .ok_or_else(|| StepError::ActionNotFound {
                piece: piece_name.to_string(),
                action: action_name.to_string(),
            })
    }

    pub fn get_trigger(
        &self,
        piece_name: &str,
        trigger_name: &str,
    ) -> Result<Arc<dyn PieceTrigger>, StepError> {
        self.get(piece_name)?
            .trigger(trigger_name)
            .ok_or_else(|| StepError::TriggerNotFound {
                piece: piece_name.to_string(),
                trigger: trigger_name.to_string(),
            })
    }

    /// Get all registered piece names, sorted
    pub fn list_pieces(&self) -> Vec<String> {
        let mut names: Vec<String> = self.pieces.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn get_metadata(&self, piece_name: &str) -> Option<PieceMetadata> {
        self.pieces.get(piece_name).map(|p| p.metadata())
    }
}

impl Default for PieceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Compiled code modules, addressed by artifact id or step name.
#[derive(Default)]
pub struct CodeRegistry {
    modules: HashMap<String, Arc<dyn CodeModule>>,
}

impl CodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: impl Into<String>, module: Arc<dyn CodeModule>) {
        self.modules.insert(id.into(), module);
    }
}

impl CodeLoader for CodeRegistry {
    fn load(&self, step_name: &str, artifact_id: Option<&str>) -> Option<Arc<dyn CodeModule>> {
        artifact_id
            .and_then(|id| self.modules.get(id))
            .or_else(|| self.modules.get(step_name))
            .cloned()
    }
}

/// Connection values known up front.
#[derive(Debug, Default, Clone)]
pub struct StaticConnections {
    values: HashMap<String, Value>,
}

impl StaticConnections {
    pub fn new(values: HashMap<String, Value>) -> Self {
        Self { values }
    }

    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.values.insert(name.into(), value);
        self
    }
}

#[async_trait]
impl ConnectionProvider for StaticConnections {
    async fn get(&self, name: &str) -> Result<Option<Value>, StepError> {
        Ok(self.values.get(name).cloned())
    }
}
