//! Embedding service abstraction
//!
//! Every backend turns text into a vector of the configured dimension and
//! reports failures as [`RagError::EmbeddingService`] or
//! [`RagError::DimensionMismatch`]. Ingestion and retrieval must use the same
//! model; that is a deployment invariant the interface cannot enforce.

pub mod gemini;
pub mod huggingface;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{EmbeddingProvider, EmbeddingSettings};
use crate::error::RagError;
use crate::server::models::record::EmbeddingPurpose;

pub use gemini::GeminiEmbeddingClient;
pub use huggingface::HuggingFaceEmbeddingClient;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
  /// Embed `text`. Pass `Document` when storing and `Query` when searching.
  async fn embed(&self, text: &str, purpose: EmbeddingPurpose) -> Result<Vec<f32>, RagError>;

  /// Length of every vector this client returns
  fn dimension(&self) -> usize;

  /// Model identifier, recorded so ingestion and retrieval can be compared
  fn model_id(&self) -> String;
}

/// Reject vectors whose length differs from the configured dimension
pub fn validate_dimension(expected: usize, vector: Vec<f32>) -> Result<Vec<f32>, RagError> {
  if vector.len() != expected {
    return Err(RagError::dimension_mismatch(expected, vector.len()));
  }
  Ok(vector)
}

/// Build the configured embedding backend
pub fn create_embedding_client(settings: &EmbeddingSettings) -> Result<Arc<dyn EmbeddingClient>> {
  let client: Arc<dyn EmbeddingClient> = match settings.provider {
    EmbeddingProvider::HuggingFace => Arc::new(HuggingFaceEmbeddingClient::new(settings)?),
    EmbeddingProvider::Gemini => Arc::new(GeminiEmbeddingClient::new(settings)?),
  };

  tracing::info!(model = %client.model_id(), dimension = client.dimension(), "embedding client ready");
  Ok(client)
}
