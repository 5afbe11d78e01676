//! Provider and queue settings derived from the labeling configuration.

use cardgraph_core::LabelingConfig;
use std::time::Duration;

/// Where labeling requests go and as whom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSettings {
    /// Base URL without the `/chat/completions` suffix
    pub base_url: String,

    /// Chat model name
    pub model: String,

    /// API key; `None` disables remote calls entirely
    pub api_key: Option<String>,
}

impl ProviderSettings {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            api_key,
        }
    }

    pub fn from_config(config: &LabelingConfig, api_key: Option<String>) -> Self {
        Self::new(config.base_url.clone(), config.model.clone(), api_key)
    }

    /// Full chat-completions URL.
    pub fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    /// Tag identifying labels produced by this model at this endpoint.
    ///
    /// Switching model or endpoint changes the tag, so labels cached under the
    /// old tag are never reused.
    pub fn model_version_tag(&self) -> String {
        format!("{}@{}", self.model, self.base_url.trim_end_matches('/'))
    }
}

/// Concurrency and retry policy of the label request queue.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueSettings {
    /// Maximum number of outstanding remote calls
    pub max_concurrent: usize,

    /// First retry delay, doubled per attempt
    pub backoff_base: Duration,

    /// Cap on the doubled delay
    pub backoff_max: Duration,

    /// Upper bound of the uniform random jitter added to each delay
    pub jitter: Duration,

    /// Optional bound on a whole submission, retries included
    pub deadline: Option<Duration>,
}

impl QueueSettings {
    pub fn from_config(config: &LabelingConfig) -> Self {
        Self {
            max_concurrent: config.max_concurrent.max(1),
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            backoff_max: Duration::from_millis(config.backoff_max_ms),
            jitter: Duration::from_millis(config.jitter_ms),
            deadline: config.deadline_secs.map(Duration::from_secs),
        }
    }

    /// Delay before retry number `attempt` (0-based), without jitter.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.min(31);
        self.backoff_base
            .checked_mul(factor)
            .unwrap_or(self.backoff_max)
            .min(self.backoff_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_url_trims_trailing_slash() {
        let settings = ProviderSettings::new("http://localhost:8080/v1/", "m", None);
        assert_eq!(settings.chat_url(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn test_model_version_tag_tracks_model_and_endpoint() {
        let a = ProviderSettings::new("https://api.openai.com/v1", "gpt-4o-mini", None);
        let b = ProviderSettings::new("https://api.openai.com/v1/", "gpt-4o-mini", None);
        let c = ProviderSettings::new("https://api.openai.com/v1", "gpt-4o", None);
        let d = ProviderSettings::new("http://localhost:11434/v1", "gpt-4o-mini", None);

        assert_eq!(a.model_version_tag(), b.model_version_tag());
        assert_ne!(a.model_version_tag(), c.model_version_tag());
        assert_ne!(a.model_version_tag(), d.model_version_tag());
    }

    #[test]
    fn test_backoff_doubles_then_caps() {
        let settings = QueueSettings {
            max_concurrent: 1,
            backoff_base: Duration::from_millis(500),
            backoff_max: Duration::from_millis(3_000),
            jitter: Duration::ZERO,
            deadline: None,
        };

        assert_eq!(settings.backoff_delay(0), Duration::from_millis(500));
        assert_eq!(settings.backoff_delay(1), Duration::from_millis(1_000));
        assert_eq!(settings.backoff_delay(2), Duration::from_millis(2_000));
        assert_eq!(settings.backoff_delay(3), Duration::from_millis(3_000));
        assert_eq!(settings.backoff_delay(40), Duration::from_millis(3_000));
    }
}
