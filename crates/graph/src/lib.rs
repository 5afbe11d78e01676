//! Semantic card graph.
//!
//! Builds exact K-nearest-neighbor tables over card embeddings, turns them
//! into undirected candidate edges and labels each edge with a relation,
//! caching both the tables and the labels in a key-value store.

pub mod collection;
pub mod edges;
pub mod knn;
pub mod labeler;
pub mod prompt;
pub mod relation_cache;
pub mod signature;
pub mod similarity;
pub mod types;

// Re-export commonly used types
pub use collection::CardCollection;
pub use edges::candidate_edges;
pub use knn::KnnIndex;
pub use labeler::EdgeLabeler;
pub use relation_cache::RelationCache;
pub use similarity::{ExactScan, NeighborSearch};
pub use types::{
    Card, Edge, EmbeddingMap, KnnTable, LabeledEdge, NeighborEntry, RelationLabel, ScoredEdge,
};

use cardgraph_core::{AppResult, GraphConfig};
use std::time::Instant;

/// Build the labeled neighbor graph of a card collection.
///
/// Fails only when the KNN build rejects its input; labeling problems show up
/// as default labels.
pub async fn build_graph(
    index: &KnnIndex,
    labeler: &EdgeLabeler,
    collection: &CardCollection,
    config: &GraphConfig,
) -> AppResult<Vec<LabeledEdge>> {
    let start = Instant::now();

    let table = index
        .build(
            &collection.embeddings,
            &collection.ids(),
            config.k,
            &config.cache_prefix,
        )
        .await?;

    let scored = candidate_edges(&table, config.min_score);
    let edges: Vec<Edge> = scored.iter().map(|s| s.edge.clone()).collect();
    let labels = labeler.label_edges(&edges, &collection.card_map()).await;

    let graph: Vec<LabeledEdge> = scored
        .into_iter()
        .zip(labels)
        .map(|(scored, label)| LabeledEdge {
            source: scored.edge.source,
            target: scored.edge.target,
            score: scored.score,
            label,
        })
        .collect();

    tracing::info!(
        "Built graph with {} edges over {} cards in {:.2}s",
        graph.len(),
        collection.cards.len(),
        start.elapsed().as_secs_f64()
    );

    Ok(graph)
}
