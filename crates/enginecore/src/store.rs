use crate::{FlowId, StepError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Key-value storage behind the piece `store`. Implemented by the worker;
/// [`InMemoryStore`] serves tests and the CLI.
#[async_trait]
pub trait StoreBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, StepError>;
    async fn put(&self, key: &str, value: Value) -> Result<(), StepError>;
    async fn delete(&self, key: &str) -> Result<(), StepError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StoreScope {
    #[default]
    Project,
    Flow,
}

/// Store handle given to a piece, namespaced by scope.
#[derive(Clone)]
pub struct ScopedStore {
    backend: Arc<dyn StoreBackend>,
    flow_id: FlowId,
}

impl ScopedStore {
    pub fn new(backend: Arc<dyn StoreBackend>, flow_id: FlowId) -> Self {
        Self { backend, flow_id }
    }

    fn scoped_key(&self, key: &str, scope: StoreScope) -> String {
        match scope {
            StoreScope::Project => key.to_string(),
            StoreScope::Flow => format!("flow_{}/{}", self.flow_id, key),
        }
    }

    pub async fn get(&self, key: &str, scope: StoreScope) -> Result<Option<Value>, StepError> {
        self.backend.get(&self.scoped_key(key, scope)).await
    }

    pub async fn put(&self, key: &str, value: Value, scope: StoreScope) -> Result<(), StepError> {
        self.backend.put(&self.scoped_key(key, scope), value).await
    }

    pub async fn delete(&self, key: &str, scope: StoreScope) -> Result<(), StepError> {
        self.backend.delete(&self.scoped_key(key, scope)).await
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    data: RwLock<HashMap<String, Value>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StepError> {
        Ok(self.data.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: Value) -> Result<(), StepError> {
        self.data.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StepError> {
        self.data.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_flow_scope_is_isolated_per_flow() {
        let backend: Arc<dyn StoreBackend> = Arc::new(InMemoryStore::new());
        let a = ScopedStore::new(backend.clone(), Uuid::new_v4());
        let b = ScopedStore::new(backend, Uuid::new_v4());

        a.put("counter", json!(1), StoreScope::Flow).await.unwrap();
        a.put("shared", json!("p"), StoreScope::Project).await.unwrap();

        assert_eq!(b.get("counter", StoreScope::Flow).await.unwrap(), None);
        assert_eq!(b.get("shared", StoreScope::Project).await.unwrap(), Some(json!("p")));

        a.delete("counter", StoreScope::Flow).await.unwrap();
        assert_eq!(a.get("counter", StoreScope::Flow).await.unwrap(), None);
    }
}
