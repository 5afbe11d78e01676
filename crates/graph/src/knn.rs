//! KNN index builder with a signature-checked persisted cache.
//!
//! A cached table is reused only when its id sequence, K, dimensionality and
//! signature all match the current build. Vector contents are not compared:
//! an id is assumed to keep its embedding for as long as the dimensionality
//! does not change.

use crate::signature::{cache_key, signature};
use crate::similarity::NeighborSearch;
use crate::types::{EmbeddingMap, KnnTable, NeighborEntry};
use cardgraph_core::{AppError, AppResult, KvStore};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

/// Builds neighbor tables and keeps them in the key-value store.
pub struct KnnIndex {
    store: Arc<dyn KvStore>,
    search: Arc<dyn NeighborSearch>,
}

impl KnnIndex {
    pub fn new(store: Arc<dyn KvStore>, search: Arc<dyn NeighborSearch>) -> Self {
        Self { store, search }
    }

    /// Return the KNN table for `ids`, from cache when still valid.
    ///
    /// Ids without a vector get an empty neighbor list and are never offered
    /// as neighbors. Vectors whose length differs from the first vector found
    /// are treated the same way.
    ///
    /// # Errors
    /// `InvalidInput` when `ids` is empty or `k` is zero. Store failures are
    /// logged and treated as a cache miss or a skipped write.
    pub async fn build(
        &self,
        embeddings: &EmbeddingMap,
        ids: &[String],
        k: usize,
        cache_prefix: &str,
    ) -> AppResult<KnnTable> {
        if ids.is_empty() {
            return Err(AppError::InvalidInput(
                "cannot build a KNN table over zero cards".to_string(),
            ));
        }
        if k == 0 {
            return Err(AppError::InvalidInput("k must be at least 1".to_string()));
        }

        let dim = ids
            .iter()
            .find_map(|id| embeddings.get(id))
            .map(Vec::len)
            .unwrap_or(0);
        let signature = signature(ids, dim);
        let key = cache_key(cache_prefix, k, &signature);

        if let Some(table) = self.load_cached(&key, ids, k, dim, &signature) {
            tracing::info!(
                "KNN table cache hit for {} cards (k={}, dim={})",
                ids.len(),
                k,
                dim
            );
            return Ok(table);
        }

        tracing::info!(
            "KNN table cache miss; scanning {} cards (k={}, dim={})",
            ids.len(),
            k,
            dim
        );
        let start = Instant::now();

        let vectors: Vec<Option<&[f32]>> = ids
            .iter()
            .map(|id| {
                embeddings
                    .get(id)
                    .map(Vec::as_slice)
                    .filter(|vector| vector.len() == dim)
            })
            .collect();

        let missing = vectors.iter().filter(|v| v.is_none()).count();
        if missing > 0 {
            tracing::warn!("{} of {} cards have no usable embedding", missing, ids.len());
        }

        let rows = self.search.search(&vectors, k).await;

        let neighbors: BTreeMap<usize, Vec<NeighborEntry>> = rows
            .into_iter()
            .enumerate()
            .map(|(row, found)| {
                let entries = found
                    .into_iter()
                    .map(|(other, score)| NeighborEntry {
                        score,
                        id: ids[other].clone(),
                    })
                    .collect();
                (row, entries)
            })
            .collect();

        let table = KnnTable {
            ids: ids.to_vec(),
            k,
            dim,
            signature,
            neighbors,
            built_at: Utc::now(),
        };

        tracing::info!(
            "Built KNN table for {} cards in {:.2}s",
            ids.len(),
            start.elapsed().as_secs_f64()
        );

        self.persist(&key, &table);
        Ok(table)
    }

    fn load_cached(
        &self,
        key: &str,
        ids: &[String],
        k: usize,
        dim: usize,
        signature: &str,
    ) -> Option<KnnTable> {
        let value = match self.store.get(key) {
            Ok(Some(value)) => value,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("Failed to read cached KNN table '{}': {}", key, e);
                return None;
            }
        };

        let table: KnnTable = match serde_json::from_value(value) {
            Ok(table) => table,
            Err(e) => {
                tracing::warn!("Ignoring unreadable cached KNN table '{}': {}", key, e);
                return None;
            }
        };

        let matches = table.ids.as_slice() == ids
            && table.k == k
            && table.dim == dim
            && table.signature == signature;

        if !matches {
            tracing::debug!("Cached KNN table '{}' is stale", key);
            return None;
        }

        Some(table)
    }

    fn persist(&self, key: &str, table: &KnnTable) {
        let value = match serde_json::to_value(table) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Failed to serialize KNN table: {}", e);
                return;
            }
        };

        if let Err(e) = self.store.set(key, value) {
            tracing::warn!("Failed to persist KNN table '{}': {}", key, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::ExactScan;
    use cardgraph_core::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts how often the similarity scan actually runs.
    struct CountingSearch {
        inner: ExactScan,
        calls: AtomicUsize,
    }

    impl CountingSearch {
        fn new() -> Self {
            Self {
                inner: ExactScan::default(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl NeighborSearch for CountingSearch {
        async fn search(&self, vectors: &[Option<&[f32]>], k: usize) -> Vec<Vec<(usize, f32)>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.search(vectors, k).await
        }
    }

    fn scenario() -> (EmbeddingMap, Vec<String>) {
        let mut embeddings = EmbeddingMap::new();
        embeddings.insert("a".to_string(), vec![1.0, 0.0]);
        embeddings.insert("b".to_string(), vec![0.9, 0.1]);
        embeddings.insert("c".to_string(), vec![-1.0, 0.0]);
        let ids = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        (embeddings, ids)
    }

    fn index() -> (KnnIndex, Arc<CountingSearch>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let search = Arc::new(CountingSearch::new());
        (KnnIndex::new(store.clone(), search.clone()), search, store)
    }

    #[tokio::test]
    async fn test_scenario_neighbors() {
        let (embeddings, ids) = scenario();
        let (index, _, _) = index();

        let table = index.build(&embeddings, &ids, 1, "knn").await.unwrap();

        assert_eq!(table.dim, 2);
        let a = table.neighbors_of_id("a");
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].id, "b");
        assert!((a[0].score - 0.9).abs() < 1e-6);
        assert_eq!(table.neighbors_of_id("c")[0].id, "b");
    }

    #[tokio::test]
    async fn test_second_build_is_served_from_cache() {
        let (embeddings, ids) = scenario();
        let (index, search, store) = index();

        let first = index.build(&embeddings, &ids, 2, "knn").await.unwrap();
        let second = index.build(&embeddings, &ids, 2, "knn").await.unwrap();

        assert_eq!(first.ids, second.ids);
        assert_eq!(first, second);
        assert_eq!(search.calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_changed_inputs_rebuild() {
        let (mut embeddings, ids) = scenario();
        let (index, search, _) = index();

        index.build(&embeddings, &ids, 1, "knn").await.unwrap();

        // Different K
        index.build(&embeddings, &ids, 2, "knn").await.unwrap();
        assert_eq!(search.calls.load(Ordering::SeqCst), 2);

        // Reordered ids
        let reordered = vec!["b".to_string(), "a".to_string(), "c".to_string()];
        index.build(&embeddings, &reordered, 1, "knn").await.unwrap();
        assert_eq!(search.calls.load(Ordering::SeqCst), 3);

        // Grown card set
        embeddings.insert("d".to_string(), vec![0.0, 1.0]);
        let grown = vec![
            "a".to_string(),
            "b".to_string(),
            "c".to_string(),
            "d".to_string(),
        ];
        index.build(&embeddings, &grown, 1, "knn").await.unwrap();
        assert_eq!(search.calls.load(Ordering::SeqCst), 4);

        // Re-embedded with a different dimensionality
        let reembedded: EmbeddingMap = embeddings
            .iter()
            .map(|(id, v)| (id.clone(), vec![v[0], v[1], 0.0]))
            .collect();
        index.build(&reembedded, &grown, 1, "knn").await.unwrap();
        assert_eq!(search.calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_tampered_cache_entry_is_a_miss() {
        let (embeddings, ids) = scenario();
        let (index, search, store) = index();

        let table = index.build(&embeddings, &ids, 1, "knn").await.unwrap();
        let key = cache_key("knn", 1, &table.signature);

        let mut tampered = table.clone();
        tampered.ids.reverse();
        store.set(&key, serde_json::to_value(&tampered).unwrap()).unwrap();

        let rebuilt = index.build(&embeddings, &ids, 1, "knn").await.unwrap();
        assert_eq!(rebuilt.ids, ids);
        assert_eq!(search.calls.load(Ordering::SeqCst), 2);

        store.set(&key, serde_json::json!("garbage")).unwrap();
        index.build(&embeddings, &ids, 1, "knn").await.unwrap();
        assert_eq!(search.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_missing_vector_yields_empty_row() {
        let (embeddings, mut ids) = scenario();
        ids.push("no-vector".to_string());
        let (index, _, _) = index();

        let table = index.build(&embeddings, &ids, 3, "knn").await.unwrap();

        assert!(table.neighbors_of_id("no-vector").is_empty());
        assert!(table
            .neighbors_of_id("a")
            .iter()
            .all(|entry| entry.id != "no-vector"));
        assert_eq!(table.neighbors_of_id("a").len(), 2);
    }

    #[tokio::test]
    async fn test_rejects_empty_ids_and_zero_k() {
        let (embeddings, ids) = scenario();
        let (index, _, _) = index();

        let empty = index.build(&embeddings, &[], 1, "knn").await;
        assert!(matches!(empty, Err(AppError::InvalidInput(_))));

        let zero_k = index.build(&embeddings, &ids, 0, "knn").await;
        assert!(matches!(zero_k, Err(AppError::InvalidInput(_))));
    }
}
