//! Card collections as read from disk.

use crate::types::{Card, EmbeddingMap};
use cardgraph_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Cards plus the vectors the embedding provider produced for them.
///
/// File format:
/// ```json
/// {
///   "cards": [{"id": "c1", "front": "...", "back": "...", "tags": [], "context": ""}],
///   "embeddings": {"c1": [0.6, 0.8]}
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CardCollection {
    #[serde(default)]
    pub cards: Vec<Card>,

    #[serde(default)]
    pub embeddings: EmbeddingMap,
}

impl CardCollection {
    pub fn load(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let collection: Self = serde_json::from_str(&content).map_err(|e| {
            AppError::InvalidInput(format!("{} is not a card collection: {}", path.display(), e))
        })?;

        let mut seen = std::collections::HashSet::new();
        if let Some(card) = collection.cards.iter().find(|c| !seen.insert(c.id.as_str())) {
            return Err(AppError::InvalidInput(format!(
                "duplicate card id {:?} in {}",
                card.id,
                path.display()
            )));
        }

        tracing::debug!(
            "Loaded {} cards and {} embeddings from {}",
            collection.cards.len(),
            collection.embeddings.len(),
            path.display()
        );
        Ok(collection)
    }

    /// Card ids in file order.
    pub fn ids(&self) -> Vec<String> {
        self.cards.iter().map(|card| card.id.clone()).collect()
    }

    pub fn card_map(&self) -> HashMap<String, Card> {
        self.cards
            .iter()
            .map(|card| (card.id.clone(), card.clone()))
            .collect()
    }
}
