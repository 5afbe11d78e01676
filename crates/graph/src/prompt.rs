//! Labeling prompt construction.
//!
//! Each edge travels as a compact projection of its two cards; full card
//! records never leave the process.

use crate::types::{Card, RelationLabel};
use cardgraph_llm::ChatMessage;
use serde::Serialize;

const MAX_SIDE_CHARS: usize = 400;
const MAX_CONTEXT_CHARS: usize = 200;
const MAX_SOURCE_CHARS: usize = 300;

/// The fields of a card the model gets to see.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardProjection {
    pub front: String,
    pub back: String,
    pub tags: Vec<String>,
    pub context: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl CardProjection {
    pub fn from_card(card: &Card) -> Self {
        Self {
            front: clip(&card.front, MAX_SIDE_CHARS),
            back: clip(&card.back, MAX_SIDE_CHARS),
            tags: card.tags.clone(),
            context: clip(&card.context, MAX_CONTEXT_CHARS),
            source: card
                .source
                .as_deref()
                .filter(|s| !s.trim().is_empty())
                .map(|s| clip(s, MAX_SOURCE_CHARS)),
        }
    }
}

/// One edge of a labeling batch; `id` is the canonical edge key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgePayload {
    pub id: String,
    pub a: CardProjection,
    pub b: CardProjection,
}

fn system_prompt() -> String {
    let labels: Vec<&str> = RelationLabel::TAXONOMY.iter().map(|l| l.as_str()).collect();
    format!(
        "You classify relationships between pairs of flashcards.\n\
         For each item, choose exactly one label from: {}.\n\
         \"prerequisite-of\" means card a must be understood before card b; \
         \"part-of\", \"cause-of\" and \"example-of\" read the same way (a relates to b).\n\
         Use \"same-topic\" when nothing more specific applies.\n\
         Reply with only a JSON array of objects {{\"id\": <item id>, \"label\": <label>}}, \
         one per item, no commentary.",
        labels.join(", ")
    )
}

/// Build the two-message conversation for a batch of edges.
pub fn build_label_messages(batch: &[EdgePayload]) -> serde_json::Result<Vec<ChatMessage>> {
    let user = serde_json::to_string(batch)?;
    Ok(vec![
        ChatMessage::system(system_prompt()),
        ChatMessage::user(user),
    ])
}

fn clip(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}
