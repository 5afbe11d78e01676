//! Persisted relation labels, keyed by edge and model version.
//!
//! Entries are stored under `edge_key|model_version_tag`. Older stores kept
//! labels under the bare edge key; such a legacy entry is copied forward to
//! the versioned key the first time it is looked up.

use cardgraph_core::{AppResult, KvStore};
use serde_json::Value;
use std::sync::Arc;

pub struct RelationCache {
    store: Arc<dyn KvStore>,
}

impl RelationCache {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Cached label for `edge_key` under `model_tag`, if any.
    pub fn get(&self, edge_key: &str, model_tag: &str) -> AppResult<Option<String>> {
        let versioned = versioned_key(edge_key, model_tag);
        if let Some(label) = self.store.get(&versioned)?.and_then(label_from) {
            return Ok(Some(label));
        }

        let Some(legacy) = self.store.get(edge_key)?.and_then(label_from) else {
            return Ok(None);
        };

        tracing::debug!("Migrating legacy label for edge {:?} to {}", edge_key, model_tag);
        self.store.set(&versioned, Value::String(legacy.clone()))?;
        Ok(Some(legacy))
    }

    pub fn put(&self, edge_key: &str, model_tag: &str, label: &str) -> AppResult<()> {
        self.store.set(
            &versioned_key(edge_key, model_tag),
            Value::String(label.to_string()),
        )
    }
}

fn versioned_key(edge_key: &str, model_tag: &str) -> String {
    format!("{}|{}", edge_key, model_tag)
}

fn label_from(value: Value) -> Option<String> {
    match value {
        Value::String(label) if !label.is_empty() => Some(label),
        _ => None,
    }
}
