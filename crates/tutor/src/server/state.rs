//! Shared handler state

use anyhow::Result;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Settings;
use crate::server::services::chat::ChatOrchestrator;
use crate::server::services::embeddings::{create_embedding_client, EmbeddingClient};
use crate::server::services::generation::{GeminiGenerationClient, GenerationClient};
use crate::server::services::ingestion::IngestionPipeline;
use crate::server::services::vector_database::{create_vector_store, VectorStore};
use crate::server::types::StatusResponse;

#[derive(Clone)]
pub struct AppState {
  pub orchestrator: Arc<ChatOrchestrator>,
  pub ingestion: Arc<IngestionPipeline>,
  /// Read when `/api/ingest` is called without a body
  pub reviews_path: PathBuf,
  pub status: StatusResponse,
}

impl AppState {
  /// Wire the pipeline from already-built backends
  pub fn from_parts(
    settings: &Settings,
    embeddings: Arc<dyn EmbeddingClient>,
    store: Arc<dyn VectorStore>,
    generation: Arc<dyn GenerationClient>,
  ) -> Self {
    let status = StatusResponse {
      status: "healthy".to_string(),
      version: env!("CARGO_PKG_VERSION").to_string(),
      embedding_model: embeddings.model_id(),
      generation_model: generation.model_id(),
      store: store.backend().to_string(),
      top_k: settings.retrieval.top_k,
      started_at: Utc::now(),
    };

    let ingestion = IngestionPipeline::new(embeddings.clone(), store.clone());
    let orchestrator = ChatOrchestrator::from_settings(settings, embeddings, store, generation);

    Self {
      orchestrator: Arc::new(orchestrator),
      ingestion: Arc::new(ingestion),
      reviews_path: settings.ingestion.reviews_path.clone(),
      status,
    }
  }

  /// Build the configured backends
  pub fn from_settings(settings: &Settings) -> Result<Self> {
    let embeddings = create_embedding_client(&settings.embedding)?;
    let store = create_vector_store(&settings.store, settings.embedding.dimension)?;
    let generation: Arc<dyn GenerationClient> = Arc::new(GeminiGenerationClient::new(&settings.generation)?);
    tracing::info!(model = %generation.model_id(), "generation client ready");

    Ok(Self::from_parts(settings, embeddings, store, generation))
  }
}
