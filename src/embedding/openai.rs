//! OpenAI-compatible embeddings implementation.

use super::{l2_normalize, Embedder};
use crate::error::{KvissError, Result};
use crate::openai::{create_client, create_client_for_base, map_openai_err};
use async_openai::types::{CreateEmbeddingRequestArgs, EmbeddingInput};
use async_trait::async_trait;
use tracing::{debug, instrument};

/// Inputs longer than this are truncated from the end before embedding;
/// roughly the 8k-token input limit of the small embedding models.
const MAX_INPUT_CHARS: usize = 32_000;

/// Embedder backed by an OpenAI-compatible embeddings endpoint.
pub struct OpenAIEmbedder {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    dimensions: usize,
}

impl OpenAIEmbedder {
    /// Create an embedder with the given model and dimensions, optionally
    /// against a custom base URL.
    pub fn with_config(model: &str, dimensions: usize, base_url: Option<&str>) -> Self {
        let client = match base_url {
            Some(base) => create_client_for_base(base),
            None => create_client(),
        };

        Self {
            client,
            model: model.to_string(),
            dimensions,
        }
    }

    fn truncate_input(text: &str) -> String {
        if text.chars().count() <= MAX_INPUT_CHARS {
            return text.to_string();
        }
        text.chars().take(MAX_INPUT_CHARS).collect()
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    #[instrument(skip(self, text), fields(chars = text.len()))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let input = Self::truncate_input(text);

        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(EmbeddingInput::String(input))
            .dimensions(self.dimensions as u32)
            .build()
            .map_err(|e| KvissError::EmbeddingFailed(format!("Failed to build request: {}", e)))?;

        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| map_openai_err(e, "Embedding API"))?;

        let mut vector = response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| KvissError::EmbeddingFailed("Empty embedding response".to_string()))?;

        if vector.len() != self.dimensions {
            return Err(KvissError::EmbeddingFailed(format!(
                "Model returned {} dimensions, expected {}",
                vector.len(),
                self.dimensions
            )));
        }

        l2_normalize(&mut vector);
        debug!("Generated {}-dimensional embedding", vector.len());
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedder_creation() {
        let embedder = OpenAIEmbedder::with_config("text-embedding-3-small", 1536, None);
        assert_eq!(embedder.dimensions(), 1536);
    }

    #[test]
    fn test_truncate_input() {
        let short = "hello";
        assert_eq!(OpenAIEmbedder::truncate_input(short), "hello");

        let long = "x".repeat(MAX_INPUT_CHARS + 100);
        let truncated = OpenAIEmbedder::truncate_input(&long);
        assert_eq!(truncated.chars().count(), MAX_INPUT_CHARS);
        // The beginning survives; the tail is dropped.
        assert!(long.starts_with(&truncated));
    }
}
