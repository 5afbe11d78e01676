//! KNN command handler.
//!
//! Builds (or loads from cache) the neighbor table of a card collection.

use super::{knn_index, open_store};
use cardgraph_core::{config::AppConfig, AppError, AppResult};
use cardgraph_graph::CardCollection;
use clap::Args;
use std::path::PathBuf;

/// Print each card's nearest neighbors
#[derive(Args, Debug)]
pub struct KnnCommand {
    /// Card collection JSON file
    pub input: PathBuf,

    /// Neighbors per card (default: graph.k from config)
    #[arg(short, long)]
    pub k: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl KnnCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing knn command for {:?}", self.input);

        let collection = CardCollection::load(&self.input)?;
        let k = self.k.unwrap_or(config.graph.k);

        let index = knn_index(config, open_store(config)?);
        let table = index
            .build(
                &collection.embeddings,
                &collection.ids(),
                k,
                &config.graph.cache_prefix,
            )
            .await?;

        if self.json {
            let output = serde_json::to_string_pretty(&table)
                .map_err(|e| AppError::Serialization(format!("JSON serialization failed: {}", e)))?;
            println!("{}", output);
            return Ok(());
        }

        println!(
            "KNN table: {} cards, k={}, dim={} (signature {})",
            table.ids.len(),
            table.k,
            table.dim,
            table.signature
        );
        for (row, id) in table.ids.iter().enumerate() {
            let neighbors = table.neighbors_of(row);
            if neighbors.is_empty() {
                println!("{}: (no neighbors)", id);
                continue;
            }
            let listed: Vec<String> = neighbors
                .iter()
                .map(|n| format!("{} ({:.3})", n.id, n.score))
                .collect();
            println!("{}: {}", id, listed.join(", "));
        }

        Ok(())
    }
}
