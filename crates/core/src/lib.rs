//! Cardgraph Core Library
//!
//! This crate provides the foundational utilities shared by the cardgraph crates:
//! - Error handling (`AppError`, `AppResult`)
//! - Logging infrastructure
//! - Configuration management
//! - The persisted key-value store backing both caches

pub mod config;
pub mod error;
pub mod logging;
pub mod store;

// Re-export commonly used types
pub use config::{AppConfig, GraphConfig, LabelPolicy, LabelingConfig};
pub use error::{AppError, AppResult};
pub use store::{KvStore, MemoryStore, SqliteStore};
