//! Extraction of `{id, label}` pairs from a chat-completion response.
//!
//! Anything that does not fit the expected shape yields an empty list; the
//! caller then falls back to default labels for the whole batch.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One labeled edge as returned by the model. Either field may be missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelPair {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

impl LabelPair {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            label: Some(label.into()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Keys under which some models nest the array when asked for JSON.
const WRAPPER_KEYS: [&str; 3] = ["edges", "labels", "results"];

/// Parse a raw provider response body into label pairs.
pub fn parse_label_pairs(body: &str) -> Vec<LabelPair> {
    let completion: ChatCompletion = match serde_json::from_str(body) {
        Ok(completion) => completion,
        Err(e) => {
            tracing::warn!("Labeling response is not a chat completion: {}", e);
            return Vec::new();
        }
    };

    let Some(content) = completion
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
    else {
        tracing::warn!("Labeling response has no choices[0].message.content");
        return Vec::new();
    };

    parse_content(&content)
}

/// Parse the message content, expected to be a JSON array of `{id, label}`.
pub fn parse_content(content: &str) -> Vec<LabelPair> {
    let value: Value = match serde_json::from_str(strip_code_fence(content)) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("Labeling content is not valid JSON: {}", e);
            return Vec::new();
        }
    };

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match WRAPPER_KEYS
            .iter()
            .find_map(|key| match map.remove(*key) {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            }) {
            Some(items) => items,
            None => {
                tracing::warn!("Labeling content object has no label array");
                return Vec::new();
            }
        },
        _ => {
            tracing::warn!("Labeling content is neither an array nor an object");
            return Vec::new();
        }
    };

    items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<LabelPair>(item).ok())
        .collect()
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Drop an optional language tag on the opening fence line.
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}
