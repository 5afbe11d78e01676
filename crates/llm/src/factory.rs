//! Label request queue factory.
//!
//! Builds the production queue (reqwest transport, settings from the
//! labeling configuration) so callers only deal with `AppConfig`.

use crate::providers::OpenAiTransport;
use crate::queue::LabelRequestQueue;
use crate::types::{ProviderSettings, QueueSettings};
use cardgraph_core::{AppResult, LabelingConfig};
use std::sync::Arc;
use std::time::Duration;

/// Create a label request queue for the configured OpenAI-compatible endpoint.
///
/// A missing `api_key` is accepted: the queue then answers every submission
/// with an empty result and never touches the network.
///
/// # Errors
/// Returns error if the HTTP client cannot be initialized.
pub fn create_queue(
    config: &LabelingConfig,
    api_key: Option<String>,
) -> AppResult<Arc<LabelRequestQueue>> {
    let transport = OpenAiTransport::with_timeout(Duration::from_secs(config.request_timeout_secs))?;
    let provider = ProviderSettings::from_config(config, api_key);

    tracing::debug!(
        "Creating label queue for {} (model {}, max concurrent {})",
        provider.base_url,
        provider.model,
        config.max_concurrent
    );

    Ok(Arc::new(LabelRequestQueue::new(
        Arc::new(transport),
        provider,
        QueueSettings::from_config(config),
    )))
}
