//! Label request queue.
//!
//! Serializes outbound labeling calls behind a concurrency cap (default 1),
//! retries 429/5xx responses forever with capped exponential backoff plus
//! jitter, and shares one outbound call between concurrent submissions of the
//! same payload.
//!
//! A submission never fails: missing credentials, non-retriable statuses,
//! transport errors, malformed bodies and an expired deadline all resolve to
//! an empty result so the caller can apply default labels.

use crate::client::{ChatMessage, ChatRequest, ChatTransport};
use crate::response::{parse_label_pairs, LabelPair};
use crate::types::{ProviderSettings, QueueSettings};
use futures::future::{BoxFuture, FutureExt, Shared};
use rand::Rng;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

type SharedCall = Shared<BoxFuture<'static, Vec<LabelPair>>>;
type InFlight = Arc<Mutex<HashMap<String, SharedCall>>>;

/// Rate-limited, retrying front door to the labeling endpoint.
///
/// Construct once and share by reference (or `Arc`) with every labeler that
/// should respect the same concurrency cap.
pub struct LabelRequestQueue {
    transport: Arc<dyn ChatTransport>,
    provider: ProviderSettings,
    settings: QueueSettings,
    slots: Arc<Semaphore>,
    in_flight: InFlight,
}

impl LabelRequestQueue {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        provider: ProviderSettings,
        settings: QueueSettings,
    ) -> Self {
        let slots = Arc::new(Semaphore::new(settings.max_concurrent.max(1)));
        Self {
            transport,
            provider,
            settings,
            slots,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn provider(&self) -> &ProviderSettings {
        &self.provider
    }

    pub fn settings(&self) -> &QueueSettings {
        &self.settings
    }

    /// Tag under which labels produced through this queue are cached.
    pub fn model_version_tag(&self) -> String {
        self.provider.model_version_tag()
    }

    /// Number of distinct payloads currently queued or in flight.
    pub fn pending(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Submit a conversation and wait for the label pairs it yields.
    ///
    /// Requires a running tokio runtime: the call itself is spawned so it
    /// keeps its place in the queue even if this future is dropped.
    pub async fn submit(&self, messages: Vec<ChatMessage>) -> Vec<LabelPair> {
        let Some(api_key) = self.provider.api_key.clone() else {
            warn!(
                "No API key configured for {}; skipping remote labeling",
                self.provider.base_url
            );
            return Vec::new();
        };

        let request = ChatRequest::new(self.provider.model.clone(), messages);
        let key = request_fingerprint(&request);

        let call = {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(existing) = in_flight.get(&key) {
                debug!("Joining in-flight labeling request {}", &key[..12]);
                existing.clone()
            } else {
                let call = self.spawn_call(key.clone(), api_key, request);
                in_flight.insert(key, call.clone());
                call
            }
        };

        call.await
    }

    fn spawn_call(&self, key: String, api_key: String, request: ChatRequest) -> SharedCall {
        let transport = Arc::clone(&self.transport);
        let slots = Arc::clone(&self.slots);
        let in_flight = Arc::clone(&self.in_flight);
        let settings = self.settings.clone();
        let url = self.provider.chat_url();

        let handle = tokio::spawn(async move {
            // Waiting for a slot does not count against the deadline.
            let pairs = match slots.acquire_owned().await {
                Ok(_permit) => {
                    let attempt = run_with_retries(transport, &settings, &url, &api_key, &request);

                    match settings.deadline {
                        Some(deadline) => match tokio::time::timeout(deadline, attempt).await {
                            Ok(pairs) => pairs,
                            Err(_) => {
                                warn!(
                                    "Labeling request exceeded its {:?} deadline; using defaults",
                                    deadline
                                );
                                Vec::new()
                            }
                        },
                        None => attempt.await,
                    }
                }
                Err(_) => Vec::new(),
            };

            in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&key);

            pairs
        });

        async move {
            handle.await.unwrap_or_else(|e| {
                warn!("Labeling task failed: {}", e);
                Vec::new()
            })
        }
        .boxed()
        .shared()
    }
}

/// POST until a non-retriable status comes back.
///
/// The caller holds a queue slot for the whole loop, backoff sleeps included,
/// so retries never exceed the cap.
async fn run_with_retries(
    transport: Arc<dyn ChatTransport>,
    settings: &QueueSettings,
    url: &str,
    api_key: &str,
    request: &ChatRequest,
) -> Vec<LabelPair> {
    let mut attempt: u32 = 0;
    loop {
        let response = match transport.post_chat(url, api_key, request).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Labeling transport failed: {}", e);
                return Vec::new();
            }
        };

        if response.is_retriable() {
            let delay = settings.backoff_delay(attempt) + jitter(settings.jitter);
            warn!(
                status = response.status,
                attempt = attempt + 1,
                "Labeling endpoint busy; retrying in {:?}",
                delay
            );
            attempt = attempt.saturating_add(1);
            tokio::time::sleep(delay).await;
            continue;
        }

        if !response.is_success() {
            warn!(
                status = response.status,
                "Labeling endpoint rejected request: {}",
                truncate(&response.body, 200)
            );
            return Vec::new();
        }

        let pairs = parse_label_pairs(&response.body);
        info!("Received {} labels from {}", pairs.len(), transport.name());
        return pairs;
    }
}

fn jitter(max: Duration) -> Duration {
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
}

/// Stable identity of a request, used to coalesce duplicate submissions.
fn request_fingerprint(request: &ChatRequest) -> String {
    let mut hasher = Sha256::new();
    hasher.update(request.model.as_bytes());
    for message in &request.messages {
        hasher.update([0u8]);
        hasher.update(message.content.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
