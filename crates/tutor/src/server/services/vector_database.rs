//! Vector store abstraction for review embeddings
//!
//! Implementations (Pinecone, in-memory) can be swapped without touching the
//! ingestion or retrieval code.

use anyhow::Result;
use async_trait::async_trait;
use std::cmp::Ordering;
use std::sync::Arc;

use crate::config::{StoreProvider, StoreSettings};
use crate::error::RagError;
use crate::server::models::record::{RetrievalMatch, VectorRecord};
use crate::server::services::memory_store::InMemoryVectorStore;
use crate::server::services::pinecone::PineconeVectorStore;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VectorStore: Send + Sync {
  /// Insert or overwrite records by id. A failed batch reports the ids that were not written.
  async fn upsert(&self, records: Vec<VectorRecord>) -> Result<(), RagError>;

  /// Top-`k` records by descending similarity. Fewer than `k` (or none) is not an error.
  async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<RetrievalMatch>, RagError>;

  /// Short backend name for status reporting
  fn backend(&self) -> &'static str;
}

/// Sort matches by descending score (ties by id) and keep at most `k`
pub fn rank_matches(mut matches: Vec<RetrievalMatch>, k: usize) -> Vec<RetrievalMatch> {
  matches.sort_by(|a, b| {
    b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal).then_with(|| a.id.cmp(&b.id))
  });
  matches.truncate(k);
  matches
}

/// Build the configured vector store backend
pub fn create_vector_store(settings: &StoreSettings, dimension: usize) -> Result<Arc<dyn VectorStore>> {
  let store: Arc<dyn VectorStore> = match settings.provider {
    StoreProvider::Pinecone => Arc::new(PineconeVectorStore::new(settings)?),
    StoreProvider::Memory => Arc::new(InMemoryVectorStore::new(dimension)),
  };

  tracing::info!(backend = store.backend(), namespace = %settings.namespace, "vector store ready");
  Ok(store)
}
