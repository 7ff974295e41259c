//! Embedding providers backed by remote model services.
//!
//! Each module exposes an [`recall_memory::EmbeddingProvider`] for a specific
//! provider while sharing the error type defined in [`traits`].

#![warn(missing_docs, clippy::pedantic)]

pub mod ollama;
pub mod openai;
pub mod traits;

mod http_client;

pub use ollama::{OllamaConfig, OllamaEmbedder};
pub use openai::{OpenAiConfig, OpenAiEmbedder};
pub use traits::{AdapterError, AdapterMetadata, AdapterResult};
