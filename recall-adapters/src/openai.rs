//! `OpenAI`-compatible embedding provider.

use std::{env, fmt, time::Duration};

use async_trait::async_trait;
use hyper::Uri;
use recall_memory::{EmbeddingProvider, EmbeddingVector, MemoryResult};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::http_client::{HyperClient, build_https_client, endpoint, post_json, sanitize_base_url};
use crate::traits::{AdapterError, AdapterMetadata, AdapterResult, DimensionLatch};

/// Environment variable used when loading configuration automatically.
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

const PROVIDER: &str = "OpenAI";

/// Configuration for the `OpenAI` embedder.
#[derive(Clone)]
pub struct OpenAiConfig {
    api_key: Option<String>,
    model: String,
    base_url: String,
    dimensions: Option<usize>,
    timeout: Duration,
}

impl fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

impl OpenAiConfig {
    /// Creates a configuration using the supplied embedding model identifier.
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            api_key: None,
            model: model.into(),
            base_url: "https://api.openai.com/".to_owned(),
            dimensions: None,
            timeout: Duration::from_secs(60),
        }
    }

    /// Loads the API key from the `OPENAI_API_KEY` environment variable.
    #[must_use]
    pub fn from_env(model: impl Into<String>) -> Self {
        let mut cfg = Self::new(model);
        cfg.api_key = env::var(OPENAI_API_KEY_ENV).ok();
        cfg
    }

    /// Overrides the base URL used for API calls, e.g. for a compatible proxy.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Configuration`] if the supplied URL is invalid.
    pub fn with_base_url(mut self, base_url: impl AsRef<str>) -> AdapterResult<Self> {
        self.base_url = sanitize_base_url(PROVIDER, base_url.as_ref())?;
        Ok(self)
    }

    /// Requests shortened embeddings of the given size.
    #[must_use]
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    /// Sets the HTTP request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Supplies an explicit API key.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }
}

/// Embedder calling the `/v1/embeddings` endpoint.
pub struct OpenAiEmbedder {
    client: HyperClient,
    endpoint: Uri,
    metadata: AdapterMetadata,
    api_key: String,
    requested_dimensions: Option<usize>,
    timeout: Duration,
    latch: DimensionLatch,
}

impl fmt::Debug for OpenAiEmbedder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiEmbedder")
            .field("model", &self.metadata.model())
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl OpenAiEmbedder {
    /// Constructs a new embedder with the provided configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Configuration`] if the API key is missing or the
    /// endpoint is invalid.
    pub fn new(config: OpenAiConfig) -> AdapterResult<Self> {
        let api_key = config
            .api_key
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| AdapterError::configuration("OpenAI embedder requires an API key"))?;
        if config.model.trim().is_empty() {
            return Err(AdapterError::configuration("OpenAI model must not be empty"));
        }

        Ok(Self {
            client: build_https_client()?,
            endpoint: endpoint(PROVIDER, &config.base_url, "v1/embeddings")?,
            metadata: AdapterMetadata::new("openai", config.model),
            api_key,
            requested_dimensions: config.dimensions,
            timeout: config.timeout,
            latch: DimensionLatch::new(config.dimensions),
        })
    }

    /// Returns adapter metadata.
    #[must_use]
    pub fn metadata(&self) -> &AdapterMetadata {
        &self.metadata
    }

    fn build_body(&self, text: &str) -> AdapterResult<Vec<u8>> {
        let payload = EmbeddingsRequest {
            model: self.metadata.model(),
            input: text,
            dimensions: self.requested_dimensions,
        };
        serde_json::to_vec(&payload).map_err(|err| {
            AdapterError::invalid_request(format!("failed to encode OpenAI request: {err}"))
        })
    }

    async fn embed(&self, text: &str) -> AdapterResult<EmbeddingVector> {
        let body = self.build_body(text)?;
        let bytes = post_json(
            &self.client,
            PROVIDER,
            &self.endpoint,
            Some(&self.api_key),
            body,
            self.timeout,
        )
        .await?;
        let values = parse_response(&bytes)?;
        debug!(model = self.metadata.model(), dimensions = values.len(), "embedded text");
        self.latch.check(PROVIDER, values)
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    async fn encode(&self, text: &str) -> MemoryResult<EmbeddingVector> {
        Ok(self.embed(text).await?)
    }

    fn dimensions(&self) -> Option<usize> {
        self.latch.get()
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

fn parse_response(bytes: &[u8]) -> AdapterResult<Vec<f32>> {
    let response: EmbeddingsResponse = serde_json::from_slice(bytes)
        .map_err(|err| AdapterError::response(format!("failed to decode OpenAI response: {err}")))?;
    response
        .data
        .into_iter()
        .min_by_key(|item| item.index)
        .map(|item| item.embedding)
        .ok_or_else(|| AdapterError::response("OpenAI returned no embeddings"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_api_key_is_rejected() {
        let err = OpenAiEmbedder::new(OpenAiConfig::new("text-embedding-3-small"))
            .expect_err("missing key");
        assert!(matches!(err, AdapterError::Configuration { .. }));

        let err = OpenAiEmbedder::new(OpenAiConfig::new("text-embedding-3-small").with_api_key("  "))
            .expect_err("blank key");
        assert!(matches!(err, AdapterError::Configuration { .. }));
    }

    #[test]
    fn config_debug_redacts_key() {
        let cfg = OpenAiConfig::new("text-embedding-3-small").with_api_key("sk-secret");
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("sk-secret"));
    }

    #[test]
    fn builds_payload_with_optional_dimensions() {
        let embedder = OpenAiEmbedder::new(
            OpenAiConfig::new("text-embedding-3-small").with_api_key("test-key"),
        )
        .expect("embedder");
        assert_eq!(embedder.endpoint.path(), "/v1/embeddings");
        let body: serde_json::Value =
            serde_json::from_slice(&embedder.build_body("likes tea").unwrap()).unwrap();
        assert_eq!(body["model"], "text-embedding-3-small");
        assert_eq!(body["input"], "likes tea");
        assert!(body.get("dimensions").is_none());

        let embedder = OpenAiEmbedder::new(
            OpenAiConfig::new("text-embedding-3-small")
                .with_api_key("test-key")
                .with_dimensions(256),
        )
        .expect("embedder");
        let body: serde_json::Value =
            serde_json::from_slice(&embedder.build_body("likes tea").unwrap()).unwrap();
        assert_eq!(body["dimensions"], 256);
        assert_eq!(embedder.dimensions(), Some(256));
    }

    #[test]
    fn response_parsing_picks_first_index() {
        let values = parse_response(
            br#"{"object":"list","data":[
                {"object":"embedding","index":1,"embedding":[0.5,0.5]},
                {"object":"embedding","index":0,"embedding":[0.25,0.75]}
            ]}"#,
        )
        .unwrap();
        assert_eq!(values, vec![0.25, 0.75]);
    }

    #[test]
    fn response_parsing_rejects_empty_data() {
        let err = parse_response(br#"{"data":[]}"#).expect_err("no data");
        assert!(matches!(err, AdapterError::Response { .. }));
        assert!(parse_response(b"not json").is_err());
    }
}
