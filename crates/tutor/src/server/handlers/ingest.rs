//! Ingestion endpoint handler

use axum::{
  body::Bytes,
  extract::{Extension, State},
  http::StatusCode,
  response::Json,
};

use super::{error_response, rag_error_response, ErrorResponse};
use crate::server::middleware::RequestContext;
use crate::server::models::review::{load_reviews, parse_reviews};
use crate::server::state::AppState;
use crate::server::types::{BaseResponse, IngestResponse};

/// POST /api/ingest - Embed and store reviews from the body, or from the configured file when the body is empty
pub async fn ingest(
  State(state): State<AppState>,
  Extension(context): Extension<RequestContext>,
  body: Bytes,
) -> Result<Json<BaseResponse<IngestResponse>>, ErrorResponse> {
  let transaction_id = context.request_id;

  let reviews = if body.iter().all(u8::is_ascii_whitespace) {
    tracing::info!(path = %state.reviews_path.display(), "reading reviews from configured file");
    load_reviews(&state.reviews_path).map_err(|e| {
      tracing::error!(error = %e, "configured reviews file is unusable");
      error_response(StatusCode::INTERNAL_SERVER_ERROR, "reviews_unavailable", &format!("{e:#}"), transaction_id)
    })?
  } else {
    parse_reviews(&body).map_err(|e| {
      error_response(StatusCode::BAD_REQUEST, "invalid_reviews_document", &format!("{e:#}"), transaction_id)
    })?
  };

  match state.ingestion.ingest(&reviews).await {
    Ok(report) => {
      let response = IngestResponse { upserted: report.upserted, model: report.model };
      Ok(Json(BaseResponse::success(response, transaction_id)))
    }
    Err(err) => Err(rag_error_response(&err, transaction_id)),
  }
}
