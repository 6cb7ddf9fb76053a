//! Gemini `streamGenerateContent` backend (server-sent events)

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt::Display;
use std::time::Duration;

use super::sse::SseDecoder;
use super::{ChunkStream, GenerationClient};
use crate::config::{GenerationSettings, Secret};
use crate::error::{describe_transport_error, RagError};
use crate::server::models::conversation::{GenerationOptions, Message, Role};

/// Finish reasons that mean the answer was withheld or cut short
const ABNORMAL_FINISH_REASONS: &[&str] =
  &["SAFETY", "RECITATION", "BLOCKLIST", "PROHIBITED_CONTENT", "SPII", "OTHER"];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
  #[serde(skip_serializing_if = "Option::is_none")]
  system_instruction: Option<Content>,
  contents: Vec<Content>,
  generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  role: Option<String>,
  #[serde(default)]
  parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
  #[serde(default)]
  text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
  max_output_tokens: u32,
  temperature: f32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamEvent {
  #[serde(default)]
  candidates: Vec<Candidate>,
  prompt_feedback: Option<PromptFeedback>,
  error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
  content: Option<Content>,
  finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
  block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
  #[serde(default)]
  message: String,
}

pub struct GeminiGenerationClient {
  client: Client,
  endpoint: String,
  api_key: Secret,
  model: String,
}

impl GeminiGenerationClient {
  pub fn new(settings: &GenerationSettings) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(settings.timeout_secs))
      .build()
      .context("Failed to create generation HTTP client")?;

    let model = settings.model.trim_start_matches("models/").to_string();
    let endpoint = format!(
      "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
      settings.base_url.trim_end_matches('/'),
      model
    );

    Ok(Self { client, endpoint, api_key: settings.api_key.clone(), model })
  }
}

/// Translate role-tagged messages into Gemini's request shape
fn build_request(conversation: &[Message], options: &GenerationOptions) -> GenerateContentRequest {
  let system_text: Vec<&str> = conversation
    .iter()
    .filter(|m| m.role == Role::System)
    .map(|m| m.content.as_str())
    .collect();

  let system_instruction = (!system_text.is_empty())
    .then(|| Content { role: None, parts: vec![Part { text: system_text.join("\n\n") }] });

  let contents = conversation
    .iter()
    .filter_map(|m| {
      let role = match m.role {
        Role::User => "user",
        Role::Assistant => "model",
        Role::System => return None,
      };
      Some(Content { role: Some(role.to_string()), parts: vec![Part { text: m.content.clone() }] })
    })
    .collect();

  GenerateContentRequest {
    system_instruction,
    contents,
    generation_config: GenerationConfig {
      max_output_tokens: options.max_output_tokens,
      temperature: options.temperature,
    },
  }
}

/// Items decoded from one SSE payload, and whether the candidate reported a finish reason
struct Interpreted {
  items: Vec<Result<String, RagError>>,
  finished: bool,
}

impl Interpreted {
  fn failure(message: impl Into<String>) -> Self {
    Self { items: vec![Err(RagError::generation_stream(message))], finished: true }
  }
}

/// Turn one SSE payload into zero or more stream items, text before any failure
fn interpret_event(data: &str) -> Interpreted {
  let event: StreamEvent = match serde_json::from_str(data) {
    Ok(event) => event,
    Err(e) => return Interpreted::failure(format!("undecodable event: {e}")),
  };

  if let Some(error) = event.error {
    return Interpreted::failure(error.message);
  }

  if let Some(reason) = event.prompt_feedback.and_then(|feedback| feedback.block_reason) {
    return Interpreted::failure(format!("prompt blocked: {reason}"));
  }

  let mut interpreted = Interpreted { items: Vec::new(), finished: false };
  for candidate in event.candidates.into_iter().take(1) {
    let text: String = candidate
      .content
      .map(|content| content.parts.into_iter().map(|part| part.text).collect())
      .unwrap_or_default();

    if !text.is_empty() {
      interpreted.items.push(Ok(text));
    }

    if let Some(reason) = candidate.finish_reason {
      interpreted.finished = true;
      if ABNORMAL_FINISH_REASONS.contains(&reason.as_str()) {
        interpreted.items.push(Err(RagError::generation_stream(format!("generation stopped: {reason}"))));
      }
    }
  }
  interpreted
}

struct SseState<B, E> {
  body: BoxStream<'static, Result<B, E>>,
  decoder: SseDecoder,
  pending: VecDeque<Result<String, RagError>>,
  finished: bool,
  done: bool,
}

impl<B, E> SseState<B, E> {
  fn absorb(&mut self, data: &str) {
    let interpreted = interpret_event(data);
    self.finished |= interpreted.finished;
    self.pending.extend(interpreted.items);
  }
}

/// Adapt a raw SSE byte stream into text chunks. The stream ends after the first error item;
/// a body that closes before any finish reason ends with an error too.
pub fn decode_event_stream<S, B, E>(body: S) -> ChunkStream
where
  S: Stream<Item = Result<B, E>> + Send + 'static,
  B: AsRef<[u8]> + Send + 'static,
  E: Display + Send + 'static,
{
  let state = SseState {
    body: body.boxed(),
    decoder: SseDecoder::new(),
    pending: VecDeque::new(),
    finished: false,
    done: false,
  };

  stream::unfold(state, |mut state| async move {
    loop {
      if let Some(item) = state.pending.pop_front() {
        if item.is_err() {
          state.done = true;
          state.pending.clear();
        }
        return Some((item, state));
      }

      if state.done {
        return None;
      }

      match state.body.next().await {
        Some(Ok(bytes)) => {
          for data in state.decoder.push(bytes.as_ref()) {
            state.absorb(&data);
          }
        }
        Some(Err(e)) => {
          state.pending.push_back(Err(RagError::generation_stream(e.to_string())));
        }
        None => {
          state.done = true;
          if let Some(data) = state.decoder.finish() {
            state.absorb(&data);
          }
          if !state.finished {
            state.pending.push_back(Err(RagError::generation_stream("stream ended before a finish reason")));
          }
        }
      }
    }
  })
  .boxed()
}

#[async_trait]
impl GenerationClient for GeminiGenerationClient {
  async fn generate(
    &self,
    conversation: &[Message],
    options: &GenerationOptions,
  ) -> Result<ChunkStream, RagError> {
    let body = build_request(conversation, options);

    let response = self
      .client
      .post(&self.endpoint)
      .header("x-goog-api-key", self.api_key.expose())
      .json(&body)
      .send()
      .await
      .map_err(|e| RagError::generation_service(describe_transport_error(&e)))?;

    let status = response.status();
    if !status.is_success() {
      let text = response.text().await.unwrap_or_default();
      tracing::warn!(%status, model = %self.model, "generation request rejected");
      return Err(RagError::generation_service(format!("{status}: {text}")));
    }

    tracing::debug!(model = %self.model, "generation stream opened");
    Ok(decode_event_stream(response.bytes_stream()))
  }

  fn model_id(&self) -> String {
    self.model.clone()
  }
}
