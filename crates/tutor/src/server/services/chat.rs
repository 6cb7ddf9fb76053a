//! Chat orchestration
//!
//! One request walks `Received → Embedding → Retrieving → Prompting →
//! Generating → Streaming` and ends in `Completed` or `Failed`. Failures before
//! the first chunk are returned as errors; failures after it arrive as a final
//! [`ChatEvent::Failed`], after whatever text was already forwarded.

use futures::stream::{self, BoxStream, StreamExt};
use std::fmt;
use std::sync::Arc;

use crate::config::Settings;
use crate::error::RagError;
use crate::server::models::conversation::{split_live_query, GenerationOptions, Message};
use crate::server::services::embeddings::EmbeddingClient;
use crate::server::services::generation::{ChunkStream, GenerationClient};
use crate::server::services::prompt::{augment_query, build_conversation};
use crate::server::services::retrieval::{RetrievalAugmentor, RetrievedContext};
use crate::server::services::vector_database::VectorStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatStage {
  Received,
  Embedding,
  Retrieving,
  Prompting,
  Generating,
  Streaming,
  Completed,
  Failed,
}

impl fmt::Display for ChatStage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      ChatStage::Received => "received",
      ChatStage::Embedding => "embedding",
      ChatStage::Retrieving => "retrieving",
      ChatStage::Prompting => "prompting",
      ChatStage::Generating => "generating",
      ChatStage::Streaming => "streaming",
      ChatStage::Completed => "completed",
      ChatStage::Failed => "failed",
    };
    f.write_str(name)
  }
}

/// Items of a chat response. `Completed` and `Failed` are always last.
#[derive(Debug)]
pub enum ChatEvent {
  Chunk(String),
  Completed,
  Failed(RagError),
}

pub type ChatEventStream = BoxStream<'static, ChatEvent>;

/// Model-facing conversation plus the evidence that went into it
#[derive(Debug, Clone)]
pub struct PreparedPrompt {
  pub conversation: Vec<Message>,
  pub context: RetrievedContext,
}

pub struct ChatOrchestrator {
  retrieval: RetrievalAugmentor,
  generation: Arc<dyn GenerationClient>,
  system_prompt: String,
  options: GenerationOptions,
}

fn enter(stage: ChatStage) {
  tracing::debug!(%stage, "chat stage");
}

fn fail(stage: ChatStage, err: RagError) -> RagError {
  tracing::warn!(%stage, error = %err, key = err.key(), "chat request failed");
  enter(ChatStage::Failed);
  err
}

impl ChatOrchestrator {
  pub fn new(
    retrieval: RetrievalAugmentor,
    generation: Arc<dyn GenerationClient>,
    system_prompt: impl Into<String>,
    options: GenerationOptions,
  ) -> Self {
    Self { retrieval, generation, system_prompt: system_prompt.into(), options }
  }

  pub fn from_settings(
    settings: &Settings,
    embeddings: Arc<dyn EmbeddingClient>,
    store: Arc<dyn VectorStore>,
    generation: Arc<dyn GenerationClient>,
  ) -> Self {
    let retrieval = RetrievalAugmentor::new(embeddings, store, settings.retrieval.top_k);
    Self::new(retrieval, generation, settings.generation.system_prompt.clone(), settings.generation.options())
  }

  /// Validate the conversation, retrieve context and assemble the model prompt
  pub async fn prepare(&self, conversation: &[Message]) -> Result<PreparedPrompt, RagError> {
    enter(ChatStage::Received);
    let (history, live) = split_live_query(conversation).map_err(|e| fail(ChatStage::Received, e))?;

    enter(ChatStage::Embedding);
    let query_vector =
      self.retrieval.embed_query(&live.content).await.map_err(|e| fail(ChatStage::Embedding, e))?;

    enter(ChatStage::Retrieving);
    let context = self.retrieval.lookup(&query_vector).await.map_err(|e| fail(ChatStage::Retrieving, e))?;

    enter(ChatStage::Prompting);
    let augmented = augment_query(&live.content, &context.block);
    let conversation = build_conversation(&self.system_prompt, history, augmented);

    Ok(PreparedPrompt { conversation, context })
  }

  /// Run the whole pipeline and return the forwarded model output
  pub async fn respond(&self, conversation: &[Message]) -> Result<ChatEventStream, RagError> {
    let prompt = self.prepare(conversation).await?;

    enter(ChatStage::Generating);
    let chunks = self
      .generation
      .generate(&prompt.conversation, &self.options)
      .await
      .map_err(|e| fail(ChatStage::Generating, e))?;

    enter(ChatStage::Streaming);
    Ok(forward(chunks))
  }
}

struct Forwarding {
  chunks: ChunkStream,
  forwarded: usize,
  finished: bool,
}

/// Pass chunks through as they arrive. Dropping the returned stream drops the
/// generation stream with it.
fn forward(chunks: ChunkStream) -> ChatEventStream {
  let state = Forwarding { chunks, forwarded: 0, finished: false };

  stream::unfold(state, |mut state| async move {
    if state.finished {
      return None;
    }

    let event = match state.chunks.next().await {
      Some(Ok(text)) => {
        state.forwarded += 1;
        ChatEvent::Chunk(text)
      }
      Some(Err(err)) => {
        state.finished = true;
        tracing::warn!(forwarded = state.forwarded, error = %err, "generation stream failed");
        enter(ChatStage::Failed);
        ChatEvent::Failed(err)
      }
      None => {
        state.finished = true;
        tracing::debug!(forwarded = state.forwarded, "generation stream exhausted");
        enter(ChatStage::Completed);
        ChatEvent::Completed
      }
    };

    Some((event, state))
  })
  .boxed()
}
