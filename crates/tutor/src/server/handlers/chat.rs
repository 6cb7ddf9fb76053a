//! Chat endpoint handler

use axum::{
  body::{Body, Bytes},
  extract::{Extension, State},
  http::{header, HeaderMap, HeaderValue},
  response::{IntoResponse, Response},
};
use futures::{future, StreamExt};

use super::rag_error_response;
use crate::error::RagError;
use crate::server::middleware::RequestContext;
use crate::server::models::conversation::Message;
use crate::server::services::chat::{ChatEvent, ChatEventStream};
use crate::server::state::AppState;
use crate::server::types::ChatStreamEvent;

pub const NDJSON: &str = "application/x-ndjson";
pub const TRANSACTION_HEADER: &str = "x-transaction-id";

fn wants_ndjson(headers: &HeaderMap) -> bool {
  headers
    .get(header::ACCEPT)
    .and_then(|value| value.to_str().ok())
    .is_some_and(|value| value.contains(NDJSON))
}

/// POST /api/chat - Stream an answer to the last user message
pub async fn chat(
  State(state): State<AppState>,
  Extension(context): Extension<RequestContext>,
  headers: HeaderMap,
  body: Bytes,
) -> Response {
  let transaction_id = context.request_id;

  let conversation: Vec<Message> = match serde_json::from_slice(&body) {
    Ok(conversation) => conversation,
    Err(e) => {
      let err = RagError::invalid_conversation(format!("body is not a message array: {e}"));
      return rag_error_response(&err, transaction_id).into_response();
    }
  };

  let events = match state.orchestrator.respond(&conversation).await {
    Ok(events) => events,
    Err(err) => return rag_error_response(&err, transaction_id).into_response(),
  };

  let (content_type, body) = if wants_ndjson(&headers) {
    (NDJSON, ndjson_body(events))
  } else {
    ("text/plain; charset=utf-8", text_body(events))
  };

  let mut response = ([(header::CONTENT_TYPE, content_type)], body).into_response();
  if let Ok(value) = HeaderValue::from_str(&transaction_id.to_string()) {
    response.headers_mut().insert(TRANSACTION_HEADER, value);
  }
  response
}

/// One JSON event per line, ending with `done` or `error`
fn ndjson_body(events: ChatEventStream) -> Body {
  let lines = events.map(|event| {
    let wire = match event {
      ChatEvent::Chunk(text) => ChatStreamEvent::Chunk { text },
      ChatEvent::Completed => ChatStreamEvent::Done,
      ChatEvent::Failed(err) => ChatStreamEvent::from(&err),
    };
    serde_json::to_string(&wire).map(|mut line| {
      line.push('\n');
      line
    })
  });
  Body::from_stream(lines)
}

/// Raw text. A mid-stream failure aborts the body so the transfer is visibly incomplete.
fn text_body(events: ChatEventStream) -> Body {
  let chunks = events.filter_map(|event| {
    future::ready(match event {
      ChatEvent::Chunk(text) => Some(Ok(text)),
      ChatEvent::Completed => None,
      ChatEvent::Failed(err) => Some(Err(err)),
    })
  });
  Body::from_stream(chunks)
}
