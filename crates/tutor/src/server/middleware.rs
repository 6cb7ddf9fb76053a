//! Request context and middleware for the tutor REST API
//!
//! Every request gets a [`RequestContext`] in its extensions and runs inside a
//! tracing span carrying the request id, which handlers reuse as the
//! response's `transaction_id`.

use axum::{
  extract::Request,
  http::{HeaderMap, Method, Uri},
  middleware::Next,
  response::Response,
};
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

/// Request metadata shared with handlers
#[derive(Clone, Debug)]
pub struct RequestContext {
  /// Unique ID for this request
  pub request_id: Uuid,
  pub method: Method,
  pub uri: Uri,
  pub user_agent: String,
}

impl RequestContext {
  pub fn new(method: Method, uri: Uri, headers: &HeaderMap) -> Self {
    let user_agent = headers
      .get("user-agent")
      .and_then(|v| v.to_str().ok())
      .unwrap_or("none")
      .to_string();

    Self { request_id: Uuid::new_v4(), method, uri, user_agent }
  }
}

/// Middleware to inject RequestContext into all requests
pub async fn request_context_middleware(mut request: Request, next: Next) -> Response {
  let context = RequestContext::new(request.method().clone(), request.uri().clone(), request.headers());

  let span = tracing::info_span!(
    "request",
    id = %context.request_id,
    method = %context.method,
    path = %context.uri.path(),
  );

  async move {
    let start_time = Instant::now();
    tracing::info!(user_agent = %context.user_agent, "request started");

    request.extensions_mut().insert(context);
    let response = next.run(request).await;

    let duration_ms = start_time.elapsed().as_secs_f64() * 1000.0;
    tracing::info!(status = response.status().as_u16(), duration_ms, "request completed");
    response
  }
  .instrument(span)
  .await
}
