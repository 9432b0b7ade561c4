use crate::error::StoreError;
use serde_json::Value;
use std::sync::Arc;

/// Named-document storage a run may carry along for its steps.
///
/// The engine never touches this; steps read already-materialized state
/// (document metadata, chunk lists, prompts) and write back results. Keys
/// are logical document names, not paths.
pub trait StateStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<Value>, StoreError>;
    fn save(&self, key: &str, value: &Value) -> Result<(), StoreError>;
}

/// Shared per-run context handed opaquely to every step.
#[derive(Clone, Default)]
pub struct RunContext {
    pub notebook_id: Option<String>,
    pub vars: serde_json::Map<String, Value>,
    store: Option<Arc<dyn StateStore>>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_store(store: Arc<dyn StateStore>, notebook_id: impl Into<String>) -> Self {
        Self {
            notebook_id: Some(notebook_id.into()),
            vars: serde_json::Map::new(),
            store: Some(store),
        }
    }

    pub fn store(&self) -> Option<&Arc<dyn StateStore>> {
        self.store.as_ref()
    }

    pub fn set_var(&mut self, key: impl Into<String>, value: Value) {
        self.vars.insert(key.into(), value);
    }

    pub fn var(&self, key: &str) -> Option<&Value> {
        self.vars.get(key)
    }
}
