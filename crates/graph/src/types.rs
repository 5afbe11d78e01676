//! Core types for the card relationship graph.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Separator used in edge keys and id signatures; never part of a card id.
pub const ID_SEPARATOR: char = '\u{1f}';

/// A flashcard as supplied by the card store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Card {
    /// Opaque card identifier
    pub id: String,

    #[serde(default)]
    pub front: String,

    #[serde(default)]
    pub back: String,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Deck or note context
    #[serde(default)]
    pub context: String,

    /// Optional excerpt of the material the card was made from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Card id to unit-normalized embedding vector.
pub type EmbeddingMap = HashMap<String, Vec<f32>>;

/// One neighbor of a card: raw dot-product score and neighbor id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeighborEntry {
    pub score: f32,
    pub id: String,
}

/// Persisted result of a KNN build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnnTable {
    /// Card ids in the exact order used for the build
    pub ids: Vec<String>,

    /// Neighbors per row
    pub k: usize,

    /// Vector dimensionality
    pub dim: usize,

    /// Fingerprint of (ids, dim)
    pub signature: String,

    /// Row index to its neighbors, descending by score
    pub neighbors: BTreeMap<usize, Vec<NeighborEntry>>,

    pub built_at: DateTime<Utc>,
}

impl KnnTable {
    /// Neighbors of the card at `row`; empty when the row had no vector.
    pub fn neighbors_of(&self, row: usize) -> &[NeighborEntry] {
        self.neighbors.get(&row).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Neighbors of the card with id `id`.
    pub fn neighbors_of_id(&self, id: &str) -> &[NeighborEntry] {
        self.ids
            .iter()
            .position(|candidate| candidate == id)
            .map(|row| self.neighbors_of(row))
            .unwrap_or(&[])
    }
}

/// Undirected pair of cards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
}

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }

    /// Canonical key: smaller id, separator, larger id.
    ///
    /// `(a, b)` and `(b, a)` produce the same key.
    pub fn key(&self) -> String {
        let (low, high) = if self.source <= self.target {
            (&self.source, &self.target)
        } else {
            (&self.target, &self.source)
        };
        format!("{}{}{}", low, ID_SEPARATOR, high)
    }
}

/// Relation between two cards.
///
/// Labels outside the taxonomy are carried as [`RelationLabel::Other`] so a
/// pass-through label policy can keep them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RelationLabel {
    #[default]
    SameTopic,
    PrerequisiteOf,
    PartOf,
    CauseOf,
    ContrastsWith,
    DuplicateOf,
    ExampleOf,
    Other(String),
}

impl RelationLabel {
    /// Every taxonomy label, default first.
    pub const TAXONOMY: [RelationLabel; 7] = [
        RelationLabel::SameTopic,
        RelationLabel::PrerequisiteOf,
        RelationLabel::PartOf,
        RelationLabel::CauseOf,
        RelationLabel::ContrastsWith,
        RelationLabel::DuplicateOf,
        RelationLabel::ExampleOf,
    ];

    pub fn parse(s: &str) -> Self {
        match s {
            "same-topic" => Self::SameTopic,
            "prerequisite-of" => Self::PrerequisiteOf,
            "part-of" => Self::PartOf,
            "cause-of" => Self::CauseOf,
            "contrasts-with" => Self::ContrastsWith,
            "duplicate-of" => Self::DuplicateOf,
            "example-of" => Self::ExampleOf,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::SameTopic => "same-topic",
            Self::PrerequisiteOf => "prerequisite-of",
            Self::PartOf => "part-of",
            Self::CauseOf => "cause-of",
            Self::ContrastsWith => "contrasts-with",
            Self::DuplicateOf => "duplicate-of",
            Self::ExampleOf => "example-of",
            Self::Other(label) => label,
        }
    }

    /// Whether the label belongs to the closed taxonomy.
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl From<String> for RelationLabel {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<RelationLabel> for String {
    fn from(label: RelationLabel) -> Self {
        label.as_str().to_string()
    }
}

impl fmt::Display for RelationLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Candidate edge with the best similarity seen between its endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredEdge {
    pub edge: Edge,
    pub score: f32,
}

/// Final output row: an edge, its similarity and its relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledEdge {
    pub source: String,
    pub target: String,
    pub score: f32,
    pub label: RelationLabel,
}
