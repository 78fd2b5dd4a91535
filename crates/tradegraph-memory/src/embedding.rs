use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use serde::Deserialize;
use tracing::{debug, warn};
use tradegraph_models::MemoryConfig;

use crate::error::MemoryError;

/// Turns situation text into a vector. Swappable per deployment.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn name(&self) -> &str;
    fn dimension(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, MemoryError>;
}

/// Fallback used when no embedding backend is configured: every text maps to
/// the same zero vector, so similarity ranking degrades to insertion order.
pub struct ZeroEmbedder {
    dimension: usize,
    warned: AtomicBool,
}

impl ZeroEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            warned: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl Embedder for ZeroEmbedder {
    fn name(&self) -> &str {
        "zero"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, MemoryError> {
        if !self.warned.swap(true, Ordering::Relaxed) {
            warn!(
                dimension = self.dimension,
                "No embedding provider available, using zero vectors"
            );
        }
        Ok(vec![0.0; self.dimension])
    }
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// OpenAI-compatible `/v1/embeddings` backend.
pub struct OpenAiEmbedder {
    api_key: String,
    model: String,
    dimension: usize,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiEmbedder {
    pub fn new(api_key: String, model: String, dimension: usize) -> Self {
        Self {
            api_key,
            model,
            dimension,
            base_url: "https://api.openai.com".to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, MemoryError> {
        debug!(model = %self.model, chars = text.len(), "Requesting embedding");
        let resp = self
            .client
            .post(format!("{}/v1/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({ "model": self.model, "input": text }))
            .send()
            .await
            .map_err(|e| MemoryError::Embedding(format!("request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(MemoryError::Embedding(format!(
                "embedding endpoint returned {}",
                resp.status()
            )));
        }

        let body: EmbeddingResponse = resp
            .json()
            .await
            .map_err(|e| MemoryError::Embedding(format!("invalid response: {e}")))?;
        let embedding = body
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| MemoryError::Embedding("response carried no embedding".to_string()))?;

        if embedding.len() != self.dimension {
            return Err(MemoryError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }
        Ok(embedding)
    }
}

/// Memoizes embeddings of identical text in a moka cache.
pub struct CachedEmbedder {
    inner: Arc<dyn Embedder>,
    cache: Cache<String, Arc<Vec<f32>>>,
}

impl CachedEmbedder {
    pub fn new(inner: Arc<dyn Embedder>, max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner,
            cache: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

#[async_trait]
impl Embedder for CachedEmbedder {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, MemoryError> {
        if let Some(hit) = self.cache.get(text).await {
            return Ok(hit.as_ref().clone());
        }
        let embedding = self.inner.embed(text).await?;
        self.cache
            .insert(text.to_string(), Arc::new(embedding.clone()))
            .await;
        Ok(embedding)
    }
}

/// Pick the embedding backend from configuration and the environment.
/// Falls back to [`ZeroEmbedder`] when the API key variable is unset.
pub fn embedder_from_config(config: &MemoryConfig) -> Arc<dyn Embedder> {
    match std::env::var(&config.embedding_api_key_env) {
        Ok(key) if !key.trim().is_empty() => {
            let backend = Arc::new(OpenAiEmbedder::new(
                key,
                config.embedding_model.clone(),
                config.embedding_dimension,
            ));
            Arc::new(CachedEmbedder::new(
                backend,
                config.cache_max_capacity,
                Duration::from_secs(config.cache_ttl_seconds),
            ))
        }
        _ => {
            warn!(
                env = %config.embedding_api_key_env,
                "Embedding API key not set, memory retrieval degrades to insertion order"
            );
            Arc::new(ZeroEmbedder::new(config.embedding_dimension))
        }
    }
}

/// Cosine similarity; zero-norm vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let len = a.len().min(b.len());
    let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
    for i in 0..len {
        dot += a[i] * b[i];
        norm_a += a[i] * a[i];
        norm_b += b[i] * b[i];
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
