//! In-process vector store using exact cosine similarity

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::RagError;
use crate::server::models::record::{RetrievalMatch, ReviewMetadata, VectorRecord};
use crate::server::services::vector_database::{rank_matches, VectorStore};

/// Cosine of the angle between a query and a stored vector. Zero vectors score 0.
fn cosine_score(query: &[f32], stored: &[f32]) -> f32 {
  let (dot, query_norm, stored_norm) = query
    .iter()
    .zip(stored)
    .fold((0.0f32, 0.0f32, 0.0f32), |(dot, q, s), (a, b)| (dot + a * b, q + a * a, s + b * b));

  if query_norm == 0.0 || stored_norm == 0.0 {
    0.0
  } else {
    dot / (query_norm.sqrt() * stored_norm.sqrt())
  }
}

struct StoredVector {
  values: Vec<f32>,
  metadata: ReviewMetadata,
}

pub struct InMemoryVectorStore {
  dimension: usize,
  records: RwLock<HashMap<String, StoredVector>>,
}

impl InMemoryVectorStore {
  pub fn new(dimension: usize) -> Self {
    Self { dimension, records: RwLock::new(HashMap::new()) }
  }

  pub async fn len(&self) -> usize {
    self.records.read().await.len()
  }

  pub async fn is_empty(&self) -> bool {
    self.records.read().await.is_empty()
  }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
  async fn upsert(&self, records: Vec<VectorRecord>) -> Result<(), RagError> {
    let rejected: Vec<String> =
      records.iter().filter(|r| r.values.len() != self.dimension).map(|r| r.id.clone()).collect();

    if !rejected.is_empty() {
      return Err(RagError::store_write(
        format!("{} record(s) do not have dimension {}", rejected.len(), self.dimension),
        rejected,
      ));
    }

    let count = records.len();
    let mut stored = self.records.write().await;
    for record in records {
      stored.insert(record.id, StoredVector { values: record.values, metadata: record.metadata });
    }

    tracing::debug!(count, total = stored.len(), "upserted records into memory store");
    Ok(())
  }

  async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<RetrievalMatch>, RagError> {
    if vector.len() != self.dimension {
      return Err(RagError::dimension_mismatch(self.dimension, vector.len()));
    }

    let stored = self.records.read().await;
    let matches = stored
      .iter()
      .map(|(id, entry)| RetrievalMatch {
        id: id.clone(),
        score: cosine_score(vector, &entry.values),
        metadata: entry.metadata.clone(),
      })
      .collect();

    Ok(rank_matches(matches, k))
  }

  fn backend(&self) -> &'static str {
    "memory"
  }
}
