//! Edge labeling: relation cache first, remote model for the misses.

use crate::prompt::{build_label_messages, CardProjection, EdgePayload};
use crate::relation_cache::RelationCache;
use crate::types::{Card, Edge, RelationLabel};
use cardgraph_core::{LabelPolicy, LabelingConfig};
use cardgraph_llm::{LabelPair, LabelRequestQueue};
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Assigns a relation label to every edge, calling the model only for edges
/// the cache does not know under the current model version tag.
pub struct EdgeLabeler {
    cache: RelationCache,
    queue: Arc<LabelRequestQueue>,
    model_tag: String,
    policy: LabelPolicy,
    max_batch_size: Option<usize>,
}

impl EdgeLabeler {
    pub fn new(cache: RelationCache, queue: Arc<LabelRequestQueue>) -> Self {
        let model_tag = queue.model_version_tag();
        Self {
            cache,
            queue,
            model_tag,
            policy: LabelPolicy::default(),
            max_batch_size: None,
        }
    }

    /// Apply the policy and batch size from the labeling configuration.
    pub fn with_config(mut self, config: &LabelingConfig) -> Self {
        self.policy = config.label_policy;
        self.max_batch_size = config.max_batch_size.filter(|size| *size > 0);
        self
    }

    pub fn model_tag(&self) -> &str {
        &self.model_tag
    }

    /// Label `edges`, one label per edge in input order.
    ///
    /// Edges sharing a canonical key share one cache slot and at most one
    /// remote request. Anything still unlabeled after the round, whether the
    /// call failed, the model skipped it, or a card was missing, comes back as
    /// [`RelationLabel::SameTopic`].
    #[instrument(skip_all, fields(edges = edges.len()))]
    pub async fn label_edges(
        &self,
        edges: &[Edge],
        cards: &HashMap<String, Card>,
    ) -> Vec<RelationLabel> {
        let misses = self.collect_misses(edges, cards);

        if misses.is_empty() {
            debug!("All {} edges served from the relation cache", edges.len());
        } else {
            self.fetch(misses).await;
        }

        edges
            .iter()
            .map(|edge| {
                self.cached(&edge.key())
                    .map(|label| RelationLabel::parse(&label))
                    .unwrap_or_default()
            })
            .collect()
    }

    /// Cache misses as request payloads, one per distinct edge key.
    fn collect_misses(&self, edges: &[Edge], cards: &HashMap<String, Card>) -> Vec<EdgePayload> {
        let mut seen = HashSet::new();
        let mut misses = Vec::new();

        for edge in edges {
            let key = edge.key();
            if !seen.insert(key.clone()) || self.cached(&key).is_some() {
                continue;
            }

            let (Some(a), Some(b)) = (cards.get(&edge.source), cards.get(&edge.target)) else {
                debug!(
                    "Skipping edge {} -> {}: card record missing",
                    edge.source, edge.target
                );
                continue;
            };

            misses.push(EdgePayload {
                id: key,
                a: CardProjection::from_card(a),
                b: CardProjection::from_card(b),
            });
        }

        misses
    }

    async fn fetch(&self, misses: Vec<EdgePayload>) {
        let batch_size = self.max_batch_size.unwrap_or(misses.len()).max(1);
        info!(
            "Requesting labels for {} edges in {} batch(es) via {}",
            misses.len(),
            misses.len().div_ceil(batch_size),
            self.model_tag
        );

        let requests = misses.chunks(batch_size).filter_map(|batch| {
            match build_label_messages(batch) {
                Ok(messages) => Some(self.queue.submit(messages)),
                Err(e) => {
                    warn!("Failed to encode labeling batch: {}", e);
                    None
                }
            }
        });

        for pairs in join_all(requests).await {
            self.store_pairs(pairs);
        }
    }

    fn store_pairs(&self, pairs: Vec<LabelPair>) {
        for pair in pairs {
            let (Some(id), Some(label)) = (pair.id, pair.label) else {
                continue;
            };

            if self.policy == LabelPolicy::Strict && !RelationLabel::parse(&label).is_known() {
                debug!("Dropping out-of-taxonomy label {:?} for {:?}", label, id);
                continue;
            }

            if let Err(e) = self.cache.put(&id, &self.model_tag, &label) {
                warn!("Failed to cache label for {:?}: {}", id, e);
            }
        }
    }

    fn cached(&self, key: &str) -> Option<String> {
        match self.cache.get(key, &self.model_tag) {
            Ok(label) => label,
            Err(e) => {
                warn!("Relation cache lookup failed for {:?}: {}", key, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardgraph_core::{AppResult, KvStore, MemoryStore};
    use cardgraph_llm::{
        ChatRequest, ChatTransport, ProviderSettings, QueueSettings, TransportResponse,
    };
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Labels every item of the batch with a fixed label, or returns a fixed
    /// body when `raw` is set. Records the size of each batch it sees.
    struct EchoTransport {
        label: String,
        raw: Option<String>,
        calls: AtomicUsize,
        batches: Mutex<Vec<usize>>,
    }

    impl EchoTransport {
        fn labeling(label: &str) -> Self {
            Self {
                label: label.to_string(),
                raw: None,
                calls: AtomicUsize::new(0),
                batches: Mutex::new(Vec::new()),
            }
        }

        fn raw(body: &str) -> Self {
            Self {
                raw: Some(body.to_string()),
                ..Self::labeling("unused")
            }
        }
    }

    #[async_trait::async_trait]
    impl ChatTransport for EchoTransport {
        fn name(&self) -> &str {
            "echo"
        }

        async fn post_chat(
            &self,
            _url: &str,
            _api_key: &str,
            request: &ChatRequest,
        ) -> AppResult<TransportResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(body) = &self.raw {
                return Ok(TransportResponse::new(200, body.clone()));
            }

            let batch: Vec<Value> = serde_json::from_str(&request.messages[1].content)?;
            self.batches.lock().unwrap().push(batch.len());
            let labels: Vec<Value> = batch
                .iter()
                .map(|item| json!({"id": item["id"], "label": self.label}))
                .collect();
            let content = Value::Array(labels).to_string();
            let body = json!({"choices": [{"message": {"content": content}}]});
            Ok(TransportResponse::new(200, body.to_string()))
        }
    }

    fn labeler(transport: Arc<EchoTransport>, store: Arc<MemoryStore>) -> EdgeLabeler {
        let queue = LabelRequestQueue::new(
            transport,
            ProviderSettings::new("http://labels.test/v1", "test-model", Some("sk".into())),
            QueueSettings {
                max_concurrent: 1,
                backoff_base: Duration::from_millis(10),
                backoff_max: Duration::from_millis(10),
                jitter: Duration::ZERO,
                deadline: None,
            },
        );
        EdgeLabeler::new(RelationCache::new(store), Arc::new(queue))
    }

    fn cards(ids: &[&str]) -> HashMap<String, Card> {
        ids.iter()
            .map(|id| {
                let card = Card {
                    id: id.to_string(),
                    front: format!("front of {}", id),
                    back: format!("back of {}", id),
                    ..Card::default()
                };
                (id.to_string(), card)
            })
            .collect()
    }

    #[tokio::test]
    async fn test_malformed_response_defaults_every_edge() {
        let transport = Arc::new(EchoTransport::raw("{not json"));
        let labeler = labeler(transport.clone(), Arc::new(MemoryStore::new()));
        let edges = vec![Edge::new("a", "b"), Edge::new("b", "c")];

        let labels = labeler.label_edges(&edges, &cards(&["a", "b", "c"])).await;

        assert_eq!(labels, vec![RelationLabel::SameTopic, RelationLabel::SameTopic]);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_output_follows_input_order_and_shares_keys() {
        let store = Arc::new(MemoryStore::new());
        let labeler = labeler(Arc::new(EchoTransport::raw("")), store.clone());
        let tag = labeler.model_tag().to_string();
        store
            .set(&format!("a\u{1f}b|{}", tag), json!("part-of"))
            .unwrap();
        store
            .set(&format!("b\u{1f}c|{}", tag), json!("cause-of"))
            .unwrap();

        let edges = vec![Edge::new("c", "b"), Edge::new("a", "b"), Edge::new("b", "a")];
        let labels = labeler.label_edges(&edges, &cards(&["a", "b", "c"])).await;

        assert_eq!(
            labels,
            vec![
                RelationLabel::CauseOf,
                RelationLabel::PartOf,
                RelationLabel::PartOf
            ]
        );
    }

    #[tokio::test]
    async fn test_cache_hits_skip_the_remote_call() {
        let transport = Arc::new(EchoTransport::labeling("example-of"));
        let store = Arc::new(MemoryStore::new());
        let labeler = labeler(transport.clone(), store);
        let edges = vec![Edge::new("a", "b")];

        let first = labeler.label_edges(&edges, &cards(&["a", "b"])).await;
        let second = labeler.label_edges(&edges, &cards(&["a", "b"])).await;

        assert_eq!(first, vec![RelationLabel::ExampleOf]);
        assert_eq!(second, first);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_duplicate_edges_are_requested_once() {
        let transport = Arc::new(EchoTransport::labeling("contrasts-with"));
        let labeler = labeler(transport.clone(), Arc::new(MemoryStore::new()));
        let edges = vec![Edge::new("a", "b"), Edge::new("b", "a"), Edge::new("a", "c")];

        let labels = labeler.label_edges(&edges, &cards(&["a", "b", "c"])).await;

        assert_eq!(labels, vec![RelationLabel::ContrastsWith; 3]);
        assert_eq!(*transport.batches.lock().unwrap(), vec![2]);
    }

    #[tokio::test]
    async fn test_batches_respect_max_size() {
        let transport = Arc::new(EchoTransport::labeling("part-of"));
        let config = LabelingConfig {
            max_batch_size: Some(2),
            ..LabelingConfig::default()
        };
        let labeler =
            labeler(transport.clone(), Arc::new(MemoryStore::new())).with_config(&config);
        let edges = vec![
            Edge::new("a", "b"),
            Edge::new("a", "c"),
            Edge::new("a", "d"),
            Edge::new("b", "c"),
            Edge::new("b", "d"),
        ];

        let labels = labeler
            .label_edges(&edges, &cards(&["a", "b", "c", "d"]))
            .await;

        assert_eq!(labels, vec![RelationLabel::PartOf; 5]);
        let mut batches = transport.batches.lock().unwrap().clone();
        batches.sort_unstable();
        assert_eq!(batches, vec![1, 2, 2]);
    }

    #[tokio::test]
    async fn test_unknown_labels_follow_policy() {
        let store = Arc::new(MemoryStore::new());
        let edges = vec![Edge::new("a", "b")];

        let loose = labeler(Arc::new(EchoTransport::labeling("analogy-of")), store.clone());
        let labels = loose.label_edges(&edges, &cards(&["a", "b"])).await;
        assert_eq!(labels, vec![RelationLabel::Other("analogy-of".to_string())]);

        let strict_config = LabelingConfig {
            label_policy: LabelPolicy::Strict,
            ..LabelingConfig::default()
        };
        let strict = labeler(
            Arc::new(EchoTransport::labeling("analogy-of")),
            Arc::new(MemoryStore::new()),
        )
        .with_config(&strict_config);
        let labels = strict.label_edges(&edges, &cards(&["a", "b"])).await;
        assert_eq!(labels, vec![RelationLabel::SameTopic]);
    }

    #[tokio::test]
    async fn test_missing_card_defaults_without_request() {
        let transport = Arc::new(EchoTransport::labeling("part-of"));
        let labeler = labeler(transport.clone(), Arc::new(MemoryStore::new()));

        let labels = labeler
            .label_edges(&[Edge::new("a", "ghost")], &cards(&["a"]))
            .await;

        assert_eq!(labels, vec![RelationLabel::SameTopic]);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }
}
