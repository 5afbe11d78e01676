//! Concrete chat transports.

pub mod openai;

pub use openai::OpenAiTransport;
