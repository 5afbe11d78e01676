//! Label command handler.
//!
//! Runs the full pipeline: KNN table, candidate edges, relation labels.

use super::{knn_index, open_store};
use cardgraph_core::{config::AppConfig, AppError, AppResult};
use cardgraph_graph::{build_graph, CardCollection, EdgeLabeler, RelationCache};
use cardgraph_llm::create_queue;
use clap::Args;
use std::path::PathBuf;

/// Label the edges of a card collection's neighbor graph
#[derive(Args, Debug)]
pub struct LabelCommand {
    /// Card collection JSON file
    pub input: PathBuf,

    /// Neighbors per card (default: graph.k from config)
    #[arg(short, long)]
    pub k: Option<usize>,

    /// Drop candidate edges scoring below this similarity
    #[arg(long)]
    pub min_score: Option<f32>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl LabelCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing label command for {:?}", self.input);

        let collection = CardCollection::load(&self.input)?;

        let mut graph_config = config.graph.clone();
        if let Some(k) = self.k {
            graph_config.k = k;
        }
        if self.min_score.is_some() {
            graph_config.min_score = self.min_score;
        }

        let api_key = config.resolve_api_key();
        if api_key.is_none() {
            tracing::warn!(
                "No API key found in CARDGRAPH_API_KEY or {}; every edge will be labeled same-topic",
                config.labeling.api_key_env
            );
        }

        let store = open_store(config)?;
        let index = knn_index(config, store.clone());
        let queue = create_queue(&config.labeling, api_key)?;
        let labeler =
            EdgeLabeler::new(RelationCache::new(store), queue).with_config(&config.labeling);

        let graph = build_graph(&index, &labeler, &collection, &graph_config).await?;

        if self.json {
            let output = serde_json::to_string_pretty(&graph)
                .map_err(|e| AppError::Serialization(format!("JSON serialization failed: {}", e)))?;
            println!("{}", output);
        } else {
            for edge in &graph {
                println!(
                    "{} -[{}]- {} ({:.3})",
                    edge.source, edge.label, edge.target, edge.score
                );
            }
            println!("{} edges labeled with {}", graph.len(), labeler.model_tag());
        }

        Ok(())
    }
}
