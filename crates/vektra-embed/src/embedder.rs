//! Embedding providers.

use async_trait::async_trait;
use rig::client::EmbeddingsClient;
use rig::embeddings::EmbeddingModel as RigEmbeddingModel;
use rig::providers::openai;

use crate::TRACING_TARGET;
use crate::config::EmbedderConfig;
use crate::error::{EmbedError, EmbedResult};

/// Maximum texts sent to the provider in one request.
pub const MAX_EMBED_BATCH: usize = 96;

/// Trait for embedding backends.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embedding width produced by this backend.
    fn dimensions(&self) -> usize;

    /// Embeds texts, batching internally at [`MAX_EMBED_BATCH`].
    ///
    /// The output is aligned with the input.
    async fn embed_batch(&self, texts: &[String]) -> EmbedResult<Vec<Vec<f32>>>;
}

/// OpenAI embedding backend.
pub struct OpenAiEmbedder {
    model: openai::EmbeddingModel,
    dimensions: usize,
}

impl OpenAiEmbedder {
    /// Creates a new OpenAI embedder.
    pub fn new(config: &EmbedderConfig) -> EmbedResult<Self> {
        if config.api_key.is_empty() {
            return Err(EmbedError::NoEmbedderConfigured);
        }

        let client = openai::Client::new(&config.api_key)
            .map_err(|e| EmbedError::config(e.to_string()))?;

        Ok(Self {
            model: client.embedding_model_with_ndims(&config.model, config.dimensions),
            dimensions: config.dimensions,
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> EmbedResult<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());

        for batch in texts.chunks(MAX_EMBED_BATCH) {
            tracing::debug!(
                target: TRACING_TARGET,
                batch = batch.len(),
                "Embedding text batch"
            );

            let embeddings = self
                .model
                .embed_texts(batch.to_vec())
                .await
                .map_err(|e| EmbedError::provider(e.to_string()))?;

            vectors.extend(
                embeddings
                    .into_iter()
                    .map(|e| e.vec.into_iter().map(|v| v as f32).collect()),
            );
        }

        Ok(vectors)
    }
}

impl std::fmt::Debug for OpenAiEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEmbedder")
            .field("dimensions", &self.dimensions)
            .finish()
    }
}
