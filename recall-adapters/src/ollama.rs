//! `Ollama` embedding provider.

use std::{fmt, time::Duration};

use async_trait::async_trait;
use hyper::Uri;
use recall_memory::{EmbeddingProvider, EmbeddingVector, MemoryResult};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::http_client::{HyperClient, build_https_client, endpoint, post_json, sanitize_base_url};
use crate::traits::{AdapterError, AdapterMetadata, AdapterResult, DimensionLatch};

const PROVIDER: &str = "Ollama";

/// Configuration for the `Ollama` embedder.
#[derive(Clone, Debug)]
pub struct OllamaConfig {
    base_url: String,
    model: String,
    dimensions: Option<usize>,
    timeout: Duration,
}

impl OllamaConfig {
    /// Creates a configuration for the supplied embedding model using default
    /// settings.
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            base_url: "http://127.0.0.1:11434/".to_owned(),
            model: model.into(),
            dimensions: None,
            timeout: Duration::from_secs(30),
        }
    }

    /// Overrides the base URL of the local Ollama daemon.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Configuration`] if the supplied URL is invalid.
    pub fn with_base_url(mut self, base_url: impl AsRef<str>) -> AdapterResult<Self> {
        self.base_url = sanitize_base_url(PROVIDER, base_url.as_ref())?;
        Ok(self)
    }

    /// Declares the model's output dimension so mismatches surface on the
    /// first call.
    #[must_use]
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    /// Sets the HTTP timeout for requests to the Ollama daemon.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Embedder calling Ollama's `/api/embed` endpoint.
pub struct OllamaEmbedder {
    client: HyperClient,
    endpoint: Uri,
    metadata: AdapterMetadata,
    timeout: Duration,
    latch: DimensionLatch,
}

impl fmt::Debug for OllamaEmbedder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OllamaEmbedder")
            .field("model", &self.metadata.model())
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl OllamaEmbedder {
    /// Constructs a new embedder from the supplied configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Configuration`] if the endpoint is invalid or the
    /// model name is blank.
    #[allow(clippy::needless_pass_by_value)]
    pub fn new(config: OllamaConfig) -> AdapterResult<Self> {
        if config.model.trim().is_empty() {
            return Err(AdapterError::configuration("Ollama model must not be empty"));
        }
        Ok(Self {
            client: build_https_client()?,
            endpoint: endpoint(PROVIDER, &config.base_url, "api/embed")?,
            metadata: AdapterMetadata::new("ollama", config.model.clone()),
            timeout: config.timeout,
            latch: DimensionLatch::new(config.dimensions),
        })
    }

    /// Returns adapter metadata.
    #[must_use]
    pub fn metadata(&self) -> &AdapterMetadata {
        &self.metadata
    }

    async fn embed(&self, text: &str) -> AdapterResult<EmbeddingVector> {
        let payload = EmbedRequest {
            model: self.metadata.model(),
            input: text,
        };
        let body = serde_json::to_vec(&payload).map_err(|err| {
            AdapterError::invalid_request(format!("failed to encode Ollama request: {err}"))
        })?;

        let bytes = post_json(&self.client, PROVIDER, &self.endpoint, None, body, self.timeout).await?;
        let values = parse_response(&bytes)?;
        debug!(model = self.metadata.model(), dimensions = values.len(), "embedded text");
        self.latch.check(PROVIDER, values)
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    async fn encode(&self, text: &str) -> MemoryResult<EmbeddingVector> {
        Ok(self.embed(text).await?)
    }

    fn dimensions(&self) -> Option<usize> {
        self.latch.get()
    }
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
    #[serde(default)]
    error: Option<String>,
}

fn parse_response(bytes: &[u8]) -> AdapterResult<Vec<f32>> {
    let response: EmbedResponse = serde_json::from_slice(bytes)
        .map_err(|err| AdapterError::response(format!("failed to decode Ollama response: {err}")))?;
    if let Some(error) = response.error {
        return Err(AdapterError::response(error));
    }
    response
        .embeddings
        .into_iter()
        .next()
        .ok_or_else(|| AdapterError::response("Ollama returned no embeddings"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_base_url_without_scheme() {
        let err = OllamaConfig::new("all-minilm")
            .with_base_url("localhost:11434")
            .expect_err("missing scheme should error");
        assert!(matches!(err, AdapterError::Configuration { .. }));
    }

    #[test]
    fn sanitize_adds_trailing_slash() {
        let cfg = OllamaConfig::new("all-minilm")
            .with_base_url("http://localhost:11434")
            .expect("valid url");
        assert_eq!(cfg.base_url, "http://localhost:11434/");
    }

    #[test]
    fn rejects_blank_model() {
        let err = OllamaEmbedder::new(OllamaConfig::new(" ")).expect_err("blank model");
        assert!(matches!(err, AdapterError::Configuration { .. }));
    }

    #[test]
    fn embedder_targets_embed_endpoint() {
        let embedder = OllamaEmbedder::new(OllamaConfig::new("all-minilm").with_dimensions(384))
            .expect("embedder");
        assert_eq!(embedder.endpoint.path(), "/api/embed");
        assert_eq!(embedder.metadata().provider(), "ollama");
        assert_eq!(embedder.dimensions(), Some(384));
    }

    #[test]
    fn request_serializes_model_and_input() {
        let json = serde_json::to_value(EmbedRequest {
            model: "all-minilm",
            input: "likes hiking",
        })
        .unwrap();
        assert_eq!(json["model"], "all-minilm");
        assert_eq!(json["input"], "likes hiking");
    }

    #[test]
    fn response_parsing_takes_first_embedding() {
        let values = parse_response(br#"{"model":"all-minilm","embeddings":[[0.1,0.2],[0.3,0.4]]}"#)
            .unwrap();
        assert_eq!(values, vec![0.1, 0.2]);
    }

    #[test]
    fn response_parsing_surfaces_errors() {
        let err = parse_response(br#"{"error":"model not found"}"#).expect_err("error payload");
        assert!(err.to_string().contains("model not found"));

        let err = parse_response(br#"{"embeddings":[]}"#).expect_err("empty payload");
        assert!(matches!(err, AdapterError::Response { .. }));
    }
}
