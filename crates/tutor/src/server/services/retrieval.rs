//! Retrieval augmentation: query embedding, top-K lookup, context formatting

use std::fmt::Write as _;
use std::sync::Arc;

use crate::error::RagError;
use crate::server::models::record::{EmbeddingPurpose, RetrievalMatch};
use crate::server::services::embeddings::EmbeddingClient;
use crate::server::services::vector_database::VectorStore;

/// First line of every context block. Separates retrieved evidence from user text.
pub const RETRIEVED_CONTEXT_MARKER: &str =
  "Returned results from the review database (retrieved automatically, not written by the user):";

/// Replaces the match list when the store returned nothing
pub const NO_MATCHES_MARKER: &str = "No matching reviews were found.";

/// Matches and their rendered block, best match first
#[derive(Debug, Clone)]
pub struct RetrievedContext {
  pub matches: Vec<RetrievalMatch>,
  pub block: String,
}

pub struct RetrievalAugmentor {
  embeddings: Arc<dyn EmbeddingClient>,
  store: Arc<dyn VectorStore>,
  top_k: usize,
}

impl RetrievalAugmentor {
  pub fn new(embeddings: Arc<dyn EmbeddingClient>, store: Arc<dyn VectorStore>, top_k: usize) -> Self {
    Self { embeddings, store, top_k }
  }

  /// Embed the live user query in query mode
  pub async fn embed_query(&self, query: &str) -> Result<Vec<f32>, RagError> {
    self.embeddings.embed(query, EmbeddingPurpose::Query).await
  }

  /// Look up the top-K matches for an embedded query and render them
  pub async fn lookup(&self, query_vector: &[f32]) -> Result<RetrievedContext, RagError> {
    let matches = self.store.query(query_vector, self.top_k).await?;
    tracing::debug!(matches = matches.len(), top_k = self.top_k, "retrieved review matches");

    let block = format_context(&matches);
    Ok(RetrievedContext { matches, block })
  }

  /// Both steps in one call
  pub async fn retrieve(&self, query: &str) -> Result<RetrievedContext, RagError> {
    let vector = self.embed_query(query).await?;
    self.lookup(&vector).await
  }
}

/// Render matches into the block appended to the user query.
///
/// Output is deterministic for a given match list and never empty.
pub fn format_context(matches: &[RetrievalMatch]) -> String {
  let mut block = format!("\n\n{RETRIEVED_CONTEXT_MARKER}\n");

  if matches.is_empty() {
    block.push_str(NO_MATCHES_MARKER);
    block.push('\n');
    return block;
  }

  for (rank, hit) in matches.iter().enumerate() {
    let _ = write!(
      block,
      "\nMatch {rank}\nProfessor: {professor}\nReview: {review}\nSubject: {subject}\nStars: {stars}\n",
      rank = rank + 1,
      professor = hit.professor(),
      review = hit.metadata.review,
      subject = hit.metadata.subject,
      stars = hit.metadata.stars,
    );
  }

  block
}
