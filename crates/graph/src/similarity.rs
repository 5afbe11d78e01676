//! Exact top-K neighbor search by dot product.
//!
//! Vectors are unit-normalized upstream, so the dot product is the cosine
//! similarity. The scan is O(N²·D): every row is compared against every other
//! row. That is fine for collections of hundreds to low thousands of cards and
//! keeps the result exact.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Rows scanned between yields when nothing else is configured.
pub const DEFAULT_YIELD_EVERY: usize = 64;

/// Neighbor search over an indexed set of vectors.
///
/// `vectors[i]` is `None` for rows without an embedding. The result has one
/// entry per row: `(neighbor_row, score)` pairs sorted by descending score,
/// at most `k` long, never containing the row itself.
#[async_trait::async_trait]
pub trait NeighborSearch: Send + Sync {
    async fn search(&self, vectors: &[Option<&[f32]>], k: usize) -> Vec<Vec<(usize, f32)>>;
}

/// Brute-force scan that yields to the scheduler every `yield_every` rows.
#[derive(Debug, Clone)]
pub struct ExactScan {
    yield_every: usize,
}

impl ExactScan {
    pub fn new(yield_every: usize) -> Self {
        Self { yield_every }
    }
}

impl Default for ExactScan {
    fn default() -> Self {
        Self::new(DEFAULT_YIELD_EVERY)
    }
}

#[async_trait::async_trait]
impl NeighborSearch for ExactScan {
    async fn search(&self, vectors: &[Option<&[f32]>], k: usize) -> Vec<Vec<(usize, f32)>> {
        let total = vectors.len();
        let mut rows = Vec::with_capacity(total);

        for row in 0..total {
            rows.push(top_k_for_row(vectors, row, k));

            if self.yield_every > 0 && (row + 1) % self.yield_every == 0 {
                tracing::debug!("Similarity scan: {}/{} rows", row + 1, total);
                tokio::task::yield_now().await;
            }
        }

        rows
    }
}

/// Heap entry ordered so the weakest score sits on top.
struct Candidate {
    row: usize,
    score: f32,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap, we want the minimum on top.
        other.score.total_cmp(&self.score)
    }
}

/// Top-`k` neighbors of a single row.
pub fn top_k_for_row(vectors: &[Option<&[f32]>], row: usize, k: usize) -> Vec<(usize, f32)> {
    let Some(Some(query)) = vectors.get(row) else {
        return Vec::new();
    };
    if k == 0 {
        return Vec::new();
    }

    let mut heap: BinaryHeap<Candidate> = BinaryHeap::with_capacity(k + 1);

    for (other, vector) in vectors.iter().enumerate() {
        let Some(vector) = vector else { continue };
        if other == row {
            continue;
        }

        let score = dot(query, vector);
        if heap.len() < k {
            heap.push(Candidate { row: other, score });
        } else if heap.peek().is_some_and(|weakest| score > weakest.score) {
            heap.pop();
            heap.push(Candidate { row: other, score });
        }
    }

    let mut neighbors: Vec<(usize, f32)> = heap.into_iter().map(|c| (c.row, c.score)).collect();
    neighbors.sort_by(|a, b| b.1.total_cmp(&a.1));
    neighbors
}

/// Dot product of two equally long vectors.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}
