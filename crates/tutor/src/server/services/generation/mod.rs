//! Generative model abstraction
//!
//! `generate` either fails up front with [`RagError::GenerationService`] or
//! returns a lazy, finite stream of text chunks. A failure after streaming has
//! begun is delivered as a final `Err(RagError::GenerationStream)` item, so a
//! consumer can tell a cut-off answer from a complete one. Dropping the stream
//! releases the underlying connection.

pub mod gemini;
pub mod sse;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::RagError;
use crate::server::models::conversation::{GenerationOptions, Message};

pub use gemini::GeminiGenerationClient;

/// Incremental model output. Not restartable.
pub type ChunkStream = BoxStream<'static, Result<String, RagError>>;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GenerationClient: Send + Sync {
  async fn generate(
    &self,
    conversation: &[Message],
    options: &GenerationOptions,
  ) -> Result<ChunkStream, RagError>;

  fn model_id(&self) -> String;
}
