//! Candidate edges from a KNN table.

use crate::types::{Edge, KnnTable, ScoredEdge};
use std::collections::HashMap;

/// Turn neighbor lists into undirected candidate edges.
///
/// A pair that appears in both endpoints' lists is emitted once, at the
/// position it was first seen, with the higher of its scores. Neighbors below
/// `min_score` are skipped.
pub fn candidate_edges(table: &KnnTable, min_score: Option<f32>) -> Vec<ScoredEdge> {
    let mut edges: Vec<ScoredEdge> = Vec::new();
    let mut position: HashMap<String, usize> = HashMap::new();

    for (row, source) in table.ids.iter().enumerate() {
        for neighbor in table.neighbors_of(row) {
            if min_score.is_some_and(|floor| neighbor.score < floor) {
                continue;
            }

            let edge = Edge::new(source.clone(), neighbor.id.clone());
            match position.get(&edge.key()) {
                Some(&index) => {
                    let existing = &mut edges[index];
                    existing.score = existing.score.max(neighbor.score);
                }
                None => {
                    position.insert(edge.key(), edges.len());
                    edges.push(ScoredEdge {
                        edge,
                        score: neighbor.score,
                    });
                }
            }
        }
    }

    tracing::debug!(
        "Extracted {} candidate edges from {} cards",
        edges.len(),
        table.ids.len()
    );
    edges
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NeighborEntry;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn entry(id: &str, score: f32) -> NeighborEntry {
        NeighborEntry {
            score,
            id: id.to_string(),
        }
    }

    fn table() -> KnnTable {
        let mut neighbors = BTreeMap::new();
        neighbors.insert(0, vec![entry("b", 0.9), entry("c", 0.1)]);
        neighbors.insert(1, vec![entry("a", 0.9)]);
        neighbors.insert(2, vec![entry("b", 0.2)]);

        KnnTable {
            ids: vec!["a".to_string(), "b".to_string(), "c".to_string()],
            k: 2,
            dim: 2,
            signature: "sig:2".to_string(),
            neighbors,
            built_at: Utc::now(),
        }
    }

    #[test]
    fn test_mutual_neighbors_collapse() {
        let edges = candidate_edges(&table(), None);

        let keys: Vec<String> = edges.iter().map(|e| e.edge.key()).collect();
        assert_eq!(keys, vec!["a\u{1f}b", "a\u{1f}c", "b\u{1f}c"]);
        assert_eq!(edges[0].edge, Edge::new("a", "b"));
        assert!((edges[0].score - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_min_score_filters() {
        let edges = candidate_edges(&table(), Some(0.15));
        let keys: Vec<String> = edges.iter().map(|e| e.edge.key()).collect();
        assert_eq!(keys, vec!["a\u{1f}b", "b\u{1f}c"]);
    }

    #[test]
    fn test_keeps_higher_score_of_asymmetric_pair() {
        let mut t = table();
        t.neighbors.insert(2, vec![entry("a", 0.4)]);
        let edges = candidate_edges(&t, None);

        let ac = edges.iter().find(|e| e.edge.key() == "a\u{1f}c").unwrap();
        assert!((ac.score - 0.4).abs() < 1e-6);
    }
}
