pub mod chat;
pub mod ingest;
pub mod status;

use axum::{http::StatusCode, response::Json};
use uuid::Uuid;

use crate::error::RagError;
use crate::server::types::{ApiError, BaseResponse};

pub type ErrorResponse = (StatusCode, Json<BaseResponse<()>>);

/// HTTP status for a pipeline failure, judged by its innermost cause
pub fn status_for(err: &RagError) -> StatusCode {
  match err.root() {
    RagError::InvalidConversation { .. } | RagError::InvalidRecord { .. } => StatusCode::BAD_REQUEST,
    RagError::DimensionMismatch { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    _ => StatusCode::BAD_GATEWAY,
  }
}

pub fn rag_error_response(err: &RagError, transaction_id: Uuid) -> ErrorResponse {
  (status_for(err), Json(BaseResponse::<()>::error(vec![ApiError::from_rag(err)], transaction_id)))
}

pub fn error_response(status: StatusCode, key: &str, message: &str, transaction_id: Uuid) -> ErrorResponse {
  (status, Json(BaseResponse::<()>::error(vec![ApiError::new(key, message)], transaction_id)))
}
