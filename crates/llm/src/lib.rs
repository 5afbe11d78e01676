//! Remote labeling client for cardgraph.
//!
//! This crate talks to an OpenAI-compatible chat-completion endpoint on
//! behalf of the edge labeler. All traffic goes through a
//! [`LabelRequestQueue`], which owns the concurrency cap, the retry policy and
//! in-flight deduplication.
//!
//! # Example
//! ```no_run
//! use cardgraph_core::LabelingConfig;
//! use cardgraph_llm::{create_queue, ChatMessage};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let queue = create_queue(&LabelingConfig::default(), Some("sk-...".to_string()))?;
//! let pairs = queue
//!     .submit(vec![ChatMessage::system("Label edges."), ChatMessage::user("[]")])
//!     .await;
//! println!("{} labels", pairs.len());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;
pub mod queue;
pub mod response;
pub mod types;

// Re-export main types
pub use client::{ChatMessage, ChatRequest, ChatRole, ChatTransport, TransportResponse};
pub use factory::create_queue;
pub use providers::OpenAiTransport;
pub use queue::LabelRequestQueue;
pub use response::{parse_label_pairs, LabelPair};
pub use types::{ProviderSettings, QueueSettings};
