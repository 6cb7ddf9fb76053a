//! Error taxonomy shared by every stage of the retrieval pipeline
//!
//! External-service wrappers return these variants unmodified; the chat
//! orchestrator and ingestion pipeline surface them to callers as-is.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RagError {
  #[error("Embedding service error: {message}")]
  EmbeddingService { message: String },

  #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
  DimensionMismatch { expected: usize, actual: usize },

  #[error("Vector store write failed ({} record(s) not written): {message}", failed_ids.len())]
  StoreWrite { message: String, failed_ids: Vec<String> },

  #[error("Vector store read failed: {message}")]
  StoreRead { message: String },

  #[error("Generation request rejected: {message}")]
  GenerationService { message: String },

  #[error("Generation stream interrupted: {message}")]
  GenerationStream { message: String },

  #[error("Invalid conversation: {reason}")]
  InvalidConversation { reason: String },

  #[error("Invalid review record: {reason}")]
  InvalidRecord { reason: String },

  #[error("Ingestion aborted at record {index} ({professor}): {source}")]
  Ingestion {
    index: usize,
    professor: String,
    #[source]
    source: Box<RagError>,
  },
}

impl RagError {
  pub fn embedding_service(message: impl Into<String>) -> Self {
    Self::EmbeddingService { message: message.into() }
  }

  pub fn dimension_mismatch(expected: usize, actual: usize) -> Self {
    Self::DimensionMismatch { expected, actual }
  }

  pub fn store_write(message: impl Into<String>, failed_ids: Vec<String>) -> Self {
    Self::StoreWrite { message: message.into(), failed_ids }
  }

  pub fn store_read(message: impl Into<String>) -> Self {
    Self::StoreRead { message: message.into() }
  }

  pub fn generation_service(message: impl Into<String>) -> Self {
    Self::GenerationService { message: message.into() }
  }

  pub fn generation_stream(message: impl Into<String>) -> Self {
    Self::GenerationStream { message: message.into() }
  }

  pub fn invalid_conversation(reason: impl Into<String>) -> Self {
    Self::InvalidConversation { reason: reason.into() }
  }

  pub fn invalid_record(reason: impl Into<String>) -> Self {
    Self::InvalidRecord { reason: reason.into() }
  }

  pub fn ingestion(index: usize, professor: impl Into<String>, source: RagError) -> Self {
    Self::Ingestion { index, professor: professor.into(), source: Box::new(source) }
  }

  /// Stable machine-readable key, used as the API error key
  pub fn key(&self) -> &'static str {
    match self {
      Self::EmbeddingService { .. } => "embedding_service_error",
      Self::DimensionMismatch { .. } => "dimension_mismatch",
      Self::StoreWrite { .. } => "store_write_error",
      Self::StoreRead { .. } => "store_read_error",
      Self::GenerationService { .. } => "generation_service_error",
      Self::GenerationStream { .. } => "generation_stream_error",
      Self::InvalidConversation { .. } => "invalid_conversation",
      Self::InvalidRecord { .. } => "invalid_record",
      Self::Ingestion { .. } => "ingestion_failed",
    }
  }

  /// The innermost error, looking through ingestion wrappers
  pub fn root(&self) -> &RagError {
    match self {
      Self::Ingestion { source, .. } => source.root(),
      other => other,
    }
  }
}

/// Map reqwest transport failures onto a service error kind
pub(crate) fn describe_transport_error(err: &reqwest::Error) -> String {
  if err.is_timeout() {
    format!("request timed out: {err}")
  } else if err.is_connect() {
    format!("connection failed: {err}")
  } else {
    err.to_string()
  }
}
