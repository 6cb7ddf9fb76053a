//! Review ingestion: embed every review, then upsert them in one batch

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::RagError;
use crate::server::models::record::{record_id, EmbeddingPurpose, ReviewMetadata, VectorRecord};
use crate::server::models::review::Review;
use crate::server::services::embeddings::{validate_dimension, EmbeddingClient};
use crate::server::services::vector_database::VectorStore;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestionReport {
  pub upserted: usize,
  pub model: String,
}

pub struct IngestionPipeline {
  embeddings: Arc<dyn EmbeddingClient>,
  store: Arc<dyn VectorStore>,
}

impl IngestionPipeline {
  pub fn new(embeddings: Arc<dyn EmbeddingClient>, store: Arc<dyn VectorStore>) -> Self {
    Self { embeddings, store }
  }

  pub fn model_id(&self) -> String {
    self.embeddings.model_id()
  }

  /// Embed and key every review. The first failing record aborts the run.
  pub async fn prepare(&self, reviews: &[Review]) -> Result<Vec<VectorRecord>, RagError> {
    let dimension = self.embeddings.dimension();
    let mut occurrences: HashMap<&str, usize> = HashMap::new();
    let mut ids = HashSet::new();
    let mut records = Vec::with_capacity(reviews.len());

    for (index, review) in reviews.iter().enumerate() {
      let wrap = |err: RagError| RagError::ingestion(index, review.professor.as_str(), err);

      review.validate().map_err(wrap)?;

      let occurrence = occurrences.entry(review.professor.as_str()).or_insert(0);
      let id = record_id(&review.professor, *occurrence);
      *occurrence += 1;
      if !ids.insert(id.clone()) {
        return Err(wrap(RagError::invalid_record(format!("record id \"{id}\" is used twice in this batch"))));
      }

      let vector = self.embeddings.embed(&review.review, EmbeddingPurpose::Document).await.map_err(wrap)?;
      let values = validate_dimension(dimension, vector).map_err(wrap)?;

      records.push(VectorRecord { id, values, metadata: ReviewMetadata::from(review) });
    }

    Ok(records)
  }

  /// Ingest a batch. Nothing is written unless every review embedded successfully.
  pub async fn ingest(&self, reviews: &[Review]) -> Result<IngestionReport, RagError> {
    let model = self.model_id();
    tracing::info!(reviews = reviews.len(), %model, "starting ingestion");

    let records = match self.prepare(reviews).await {
      Ok(records) => records,
      Err(err) => {
        tracing::error!(error = %err, "ingestion aborted before writing");
        return Err(err);
      }
    };

    let upserted = records.len();
    if upserted > 0 {
      self.store.upsert(records).await?;
    }

    tracing::info!(upserted, backend = self.store.backend(), "ingestion complete");
    Ok(IngestionReport { upserted, model })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::server::services::embeddings::MockEmbeddingClient;
  use crate::server::services::vector_database::MockVectorStore;
  use std::sync::atomic::{AtomicUsize, Ordering};

  fn embedder(dimension: usize) -> MockEmbeddingClient {
    let mut embeddings = MockEmbeddingClient::new();
    embeddings.expect_dimension().return_const(dimension);
    embeddings.expect_model_id().return_const("test-model".to_string());
    embeddings
  }

  fn reviews() -> Vec<Review> {
    vec![
      Review::new("Dr. Emily Johnson", "Chemistry 101", "Engaging lectures", 4.5),
      Review::new("Dr. Robert Davis", "Chemistry 201", "Challenging but rewarding", 4.2),
      Review::new("Dr. Laura Garcia", "Organic Chemistry", "Makes complex topics clear", 4.0),
    ]
  }

  #[tokio::test]
  async fn test_ingest_embeds_documents_and_upserts_once() {
    let mut embeddings = embedder(2);
    embeddings
      .expect_embed()
      .withf(|_, purpose| *purpose == EmbeddingPurpose::Document)
      .times(3)
      .returning(|_, _| Ok(vec![0.5, 0.5]));

    let mut store = MockVectorStore::new();
    store.expect_backend().return_const("mock");
    store
      .expect_upsert()
      .withf(|records| records.len() == 3 && records[0].id == "Dr. Emily Johnson")
      .times(1)
      .returning(|_| Ok(()));

    let pipeline = IngestionPipeline::new(Arc::new(embeddings), Arc::new(store));
    let report = pipeline.ingest(&reviews()).await.unwrap();

    assert_eq!(report, IngestionReport { upserted: 3, model: "test-model".to_string() });
  }

  #[tokio::test]
  async fn test_failure_on_second_record_writes_nothing() {
    let calls = AtomicUsize::new(0);
    let mut embeddings = embedder(2);
    embeddings.expect_embed().returning(move |_, _| {
      if calls.fetch_add(1, Ordering::SeqCst) == 1 {
        Err(RagError::embedding_service("503 Service Unavailable"))
      } else {
        Ok(vec![0.5, 0.5])
      }
    });

    let mut store = MockVectorStore::new();
    store.expect_upsert().times(0);

    let pipeline = IngestionPipeline::new(Arc::new(embeddings), Arc::new(store));
    let err = pipeline.ingest(&reviews()).await.unwrap_err();

    match err {
      RagError::Ingestion { index, professor, source } => {
        assert_eq!(index, 1);
        assert_eq!(professor, "Dr. Robert Davis");
        assert!(matches!(*source, RagError::EmbeddingService { .. }));
      }
      other => panic!("unexpected error: {other:?}"),
    }
  }

  #[tokio::test]
  async fn test_wrong_dimension_aborts() {
    let mut embeddings = embedder(3);
    embeddings.expect_embed().returning(|_, _| Ok(vec![0.5, 0.5]));

    let mut store = MockVectorStore::new();
    store.expect_upsert().times(0);

    let pipeline = IngestionPipeline::new(Arc::new(embeddings), Arc::new(store));
    let err = pipeline.ingest(&reviews()).await.unwrap_err();

    assert_eq!(err.key(), "ingestion_failed");
    assert!(matches!(err.root(), RagError::DimensionMismatch { expected: 3, actual: 2 }));
  }

  #[tokio::test]
  async fn test_invalid_review_is_rejected_before_embedding() {
    let mut embeddings = embedder(2);
    embeddings.expect_embed().times(0);
    let store = MockVectorStore::new();

    let pipeline = IngestionPipeline::new(Arc::new(embeddings), Arc::new(store));
    let err = pipeline.ingest(&[Review::new("Dr. X", "Art", "fine", 9.0)]).await.unwrap_err();

    assert!(matches!(err.root(), RagError::InvalidRecord { .. }));
  }

  #[tokio::test]
  async fn test_repeated_professor_gets_distinct_ids() {
    let mut embeddings = embedder(2);
    embeddings.expect_embed().returning(|_, _| Ok(vec![0.5, 0.5]));
    let store = MockVectorStore::new();

    let pipeline = IngestionPipeline::new(Arc::new(embeddings), Arc::new(store));
    let records = pipeline
      .prepare(&[
        Review::new("Dr. A", "Math", "good", 4.0),
        Review::new("Dr. B", "Art", "ok", 3.0),
        Review::new("Dr. A", "Math 2", "great", 5.0),
      ])
      .await
      .unwrap();

    let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["Dr. A", "Dr. B", "Dr. A #2"]);
    assert_eq!(records[2].metadata.professor.as_deref(), Some("Dr. A"));
  }

  #[tokio::test]
  async fn test_colliding_record_ids_are_rejected_before_writing() {
    let mut embeddings = embedder(2);
    embeddings.expect_embed().times(2).returning(|_, _| Ok(vec![0.5, 0.5]));
    let mut store = MockVectorStore::new();
    store.expect_upsert().times(0);

    let pipeline = IngestionPipeline::new(Arc::new(embeddings), Arc::new(store));
    let err = pipeline
      .ingest(&[
        Review::new("Dr. A #2", "Math", "good", 4.0),
        Review::new("Dr. A", "Math", "fine", 3.0),
        Review::new("Dr. A", "Math 2", "great", 5.0),
      ])
      .await
      .unwrap_err();

    match err {
      RagError::Ingestion { index, professor, source } => {
        assert_eq!(index, 2);
        assert_eq!(professor, "Dr. A");
        assert!(matches!(*source, RagError::InvalidRecord { .. }));
      }
      other => panic!("unexpected error: {other:?}"),
    }
  }

  #[tokio::test]
  async fn test_empty_batch_skips_store() {
    let embeddings = embedder(2);
    let mut store = MockVectorStore::new();
    store.expect_upsert().times(0);
    store.expect_backend().return_const("mock");

    let pipeline = IngestionPipeline::new(Arc::new(embeddings), Arc::new(store));
    assert_eq!(pipeline.ingest(&[]).await.unwrap().upserted, 0);
  }

  #[tokio::test]
  async fn test_store_failure_is_surfaced_unchanged() {
    let mut embeddings = embedder(2);
    embeddings.expect_embed().returning(|_, _| Ok(vec![0.5, 0.5]));
    let mut store = MockVectorStore::new();
    store
      .expect_upsert()
      .returning(|records| Err(RagError::store_write("quota", records.iter().map(|r| r.id.clone()).collect())));

    let pipeline = IngestionPipeline::new(Arc::new(embeddings), Arc::new(store));
    match pipeline.ingest(&reviews()).await.unwrap_err() {
      RagError::StoreWrite { failed_ids, .. } => assert_eq!(failed_ids.len(), 3),
      other => panic!("unexpected error: {other:?}"),
    }
  }
}
