//! Command handlers for the cardgraph CLI.

pub mod knn;
pub mod label;

// Re-export command types for convenience
pub use knn::KnnCommand;
pub use label::LabelCommand;

use cardgraph_core::{config::AppConfig, AppResult, SqliteStore};
use cardgraph_graph::{ExactScan, KnnIndex};
use std::sync::Arc;

/// Open the workspace store shared by the KNN and relation caches.
fn open_store(config: &AppConfig) -> AppResult<Arc<SqliteStore>> {
    let path = config.store_path();
    tracing::debug!("Opening store at {:?}", path);
    Ok(Arc::new(SqliteStore::open(&path)?))
}

fn knn_index(config: &AppConfig, store: Arc<SqliteStore>) -> KnnIndex {
    KnnIndex::new(store, Arc::new(ExactScan::new(config.graph.yield_every)))
}
