//! REST API types with schemars annotations for OpenAPI generation

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::RagError;

// Base Response Structure
// ======================

/// Base response object for all JSON endpoints
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct BaseResponse<T> {
  /// API versioning information
  pub versioning: VersionInfo,

  /// Transaction ID for logging correlation
  pub transaction_id: Uuid,

  /// Optional error information
  #[serde(skip_serializing_if = "Vec::is_empty", default)]
  pub errors: Vec<ApiError>,

  /// Response data (generic for different endpoint types)
  #[serde(flatten)]
  pub data: T,
}

/// API versioning information
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct VersionInfo {
  /// The latest version of the API
  pub latest: String,

  /// The version of the API requested by the client
  pub requested: String,

  /// The version of the API that was used in producing the response
  pub resolved: String,
}

/// API error information
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ApiError {
  /// Error key, unique to the error source
  pub key: String,

  /// Human readable error message
  pub message: String,

  /// Additional error context
  #[serde(default)]
  pub context: serde_json::Value,
}

// Status/Version Endpoints
// =======================

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct VersionResponse {
  pub version: String,
}

/// Response for /status
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StatusResponse {
  pub status: String,
  pub version: String,
  pub embedding_model: String,
  pub generation_model: String,
  /// Vector store backend name
  pub store: String,
  pub top_k: usize,
  pub started_at: DateTime<Utc>,
}

// Pipeline Endpoints
// ==================

/// Response for /api/ingest
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct IngestResponse {
  /// Number of review vectors written
  pub upserted: usize,

  /// Embedding model used, so later queries can be checked against it
  pub model: String,
}

/// One line of an `application/x-ndjson` chat response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChatStreamEvent {
  Chunk { text: String },
  Done,
  Error { key: String, message: String },
}

// Helper Functions
// ================

fn version_info() -> VersionInfo {
  let version = env!("CARGO_PKG_VERSION");
  VersionInfo { latest: version.to_string(), requested: version.to_string(), resolved: version.to_string() }
}

impl<T> BaseResponse<T> {
  /// Create a successful response
  pub fn success(data: T, transaction_id: Uuid) -> Self {
    Self { versioning: version_info(), transaction_id, errors: Vec::new(), data }
  }

  /// Create an error response
  pub fn error(errors: Vec<ApiError>, transaction_id: Uuid) -> BaseResponse<()> {
    BaseResponse { versioning: version_info(), transaction_id, errors, data: () }
  }
}

impl ApiError {
  pub fn new(key: &str, message: &str) -> Self {
    Self { key: key.to_string(), message: message.to_string(), context: serde_json::Value::Null }
  }

  pub fn with_context(mut self, context: serde_json::Value) -> Self {
    self.context = context;
    self
  }

  /// Structured error for a pipeline failure. Ingestion failures name the
  /// record; store write failures list the ids that were not written.
  pub fn from_rag(err: &RagError) -> Self {
    let mut context = serde_json::Map::new();

    if let RagError::Ingestion { index, professor, .. } = err {
      context.insert("index".into(), (*index).into());
      context.insert("professor".into(), professor.clone().into());
      context.insert("cause".into(), err.root().key().into());
    }

    match err.root() {
      RagError::StoreWrite { failed_ids, .. } => {
        context.insert("failed_ids".into(), failed_ids.clone().into());
      }
      RagError::DimensionMismatch { expected, actual } => {
        context.insert("expected".into(), (*expected).into());
        context.insert("actual".into(), (*actual).into());
      }
      _ => {}
    }

    let error = Self::new(err.key(), &err.to_string());
    if context.is_empty() {
      error
    } else {
      error.with_context(serde_json::Value::Object(context))
    }
  }
}

impl From<&RagError> for ChatStreamEvent {
  fn from(err: &RagError) -> Self {
    ChatStreamEvent::Error { key: err.key().to_string(), message: err.to_string() }
  }
}
