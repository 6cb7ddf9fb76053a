//! HTTP client for the tutor REST API
//!
//! Thin wrapper the CLI uses to talk to a running `tutor serve`.

use anyhow::{anyhow, Context, Result};
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::{Client, Response};
use serde::Deserialize;
use std::collections::VecDeque;
use std::time::Duration;

use crate::server::models::conversation::Message;
use crate::server::types::{ApiError, BaseResponse, ChatStreamEvent, IngestResponse, StatusResponse};

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:3000";

/// Configuration for the tutor HTTP client
#[derive(Debug, Clone)]
pub struct ClientConfig {
  /// Base URL of the tutor server (e.g., "http://localhost:3000")
  pub base_url: String,
  /// Timeout in seconds for JSON requests and for connecting
  pub timeout_secs: u64,
}

impl Default for ClientConfig {
  fn default() -> Self {
    Self { base_url: DEFAULT_SERVER_URL.to_string(), timeout_secs: 30 }
  }
}

impl ClientConfig {
  pub fn for_server(base_url: &str) -> Self {
    Self { base_url: base_url.trim_end_matches('/').to_string(), ..Self::default() }
  }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
  #[serde(default)]
  errors: Vec<ApiError>,
}

pub type ChatEvents = BoxStream<'static, Result<ChatStreamEvent>>;

pub struct TutorClient {
  client: Client,
  config: ClientConfig,
}

impl TutorClient {
  pub fn with_config(config: ClientConfig) -> Result<Self> {
    // No overall timeout: chat answers stream for as long as the model writes
    let client = Client::builder()
      .connect_timeout(Duration::from_secs(config.timeout_secs))
      .build()
      .context("Failed to create HTTP client")?;

    Ok(Self { client, config })
  }

  fn url(&self, path: &str) -> String {
    format!("{}{path}", self.config.base_url)
  }

  fn request_timeout(&self) -> Duration {
    Duration::from_secs(self.config.timeout_secs)
  }

  pub async fn status(&self) -> Result<StatusResponse> {
    let response = self
      .client
      .get(self.url("/status"))
      .timeout(self.request_timeout())
      .send()
      .await
      .with_context(|| format!("Could not reach tutor server at {}", self.config.base_url))?;

    let response = ensure_success(response, "Status check failed").await?;
    let result: BaseResponse<StatusResponse> = response.json().await?;
    Ok(result.data)
  }

  /// Ingest a reviews document, or the server's configured file when `document` is `None`
  pub async fn ingest(&self, document: Option<Vec<u8>>) -> Result<IngestResponse> {
    let mut request = self.client.post(self.url("/api/ingest"));
    if let Some(document) = document {
      request = request.header(reqwest::header::CONTENT_TYPE, "application/json").body(document);
    }

    // Embedding a whole file takes a while; only bound the connection
    let response = request
      .send()
      .await
      .with_context(|| format!("Could not reach tutor server at {}", self.config.base_url))?;

    let response = ensure_success(response, "Ingestion failed").await?;
    let result: BaseResponse<IngestResponse> = response.json().await?;
    Ok(result.data)
  }

  /// Send a conversation and stream back its NDJSON events
  pub async fn chat(&self, conversation: &[Message]) -> Result<ChatEvents> {
    let response = self
      .client
      .post(self.url("/api/chat"))
      .header(reqwest::header::ACCEPT, "application/x-ndjson")
      .json(conversation)
      .send()
      .await
      .with_context(|| format!("Could not reach tutor server at {}", self.config.base_url))?;

    let response = ensure_success(response, "Chat request failed").await?;
    Ok(ndjson_events(response.bytes_stream()))
  }
}

/// Turn an error envelope into a readable error
async fn ensure_success(response: Response, action: &str) -> Result<Response> {
  let status = response.status();
  if status.is_success() {
    return Ok(response);
  }

  let text = response.text().await.unwrap_or_default();
  Err(anyhow!("{action}: {}", describe_error_body(status.as_u16(), &text)))
}

fn describe_error_body(status: u16, text: &str) -> String {
  match serde_json::from_str::<ErrorEnvelope>(text) {
    Ok(envelope) if !envelope.errors.is_empty() => envelope
      .errors
      .iter()
      .map(|error| {
        if error.context.is_null() {
          format!("{} ({})", error.message, error.key)
        } else {
          format!("{} ({}, {})", error.message, error.key, error.context)
        }
      })
      .collect::<Vec<_>>()
      .join("; "),
    _ => format!("HTTP {status}: {text}"),
  }
}

struct LineState<S> {
  body: S,
  buffer: Vec<u8>,
  pending: VecDeque<Result<ChatStreamEvent>>,
  done: bool,
}

fn parse_line(line: &[u8]) -> Option<Result<ChatStreamEvent>> {
  let line = String::from_utf8_lossy(line);
  let line = line.trim();
  if line.is_empty() {
    return None;
  }
  Some(serde_json::from_str(line).with_context(|| format!("Malformed chat event: {line}")))
}

/// Split a byte stream into newline-delimited JSON events
pub fn ndjson_events<S, B, E>(body: S) -> ChatEvents
where
  S: futures::Stream<Item = std::result::Result<B, E>> + Send + 'static,
  B: AsRef<[u8]> + Send + 'static,
  E: std::error::Error + Send + Sync + 'static,
{
  let state = LineState { body: body.boxed(), buffer: Vec::new(), pending: VecDeque::new(), done: false };

  stream::unfold(state, |mut state| async move {
    loop {
      if let Some(item) = state.pending.pop_front() {
        return Some((item, state));
      }
      if state.done {
        return None;
      }

      match state.body.next().await {
        Some(Ok(bytes)) => {
          state.buffer.extend_from_slice(bytes.as_ref());
          while let Some(end) = state.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = state.buffer.drain(..=end).collect();
            state.pending.extend(parse_line(&line));
          }
        }
        Some(Err(e)) => {
          state.done = true;
          state.pending.push_back(Err(anyhow!(e).context("Chat stream broke off")));
        }
        None => {
          state.done = true;
          let rest = std::mem::take(&mut state.buffer);
          state.pending.extend(parse_line(&rest));
        }
      }
    }
  })
  .boxed()
}
