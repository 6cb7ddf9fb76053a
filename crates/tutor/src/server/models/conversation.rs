//! Conversation messages exchanged with the chat endpoint

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::RagError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  User,
  #[serde(alias = "model")]
  Assistant,
  System,
}

/// One turn of a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Message {
  pub role: Role,
  pub content: String,
}

impl Message {
  pub fn new(role: Role, content: impl Into<String>) -> Self {
    Self { role, content: content.into() }
  }

  pub fn user(content: impl Into<String>) -> Self {
    Self::new(Role::User, content)
  }

  pub fn assistant(content: impl Into<String>) -> Self {
    Self::new(Role::Assistant, content)
  }

  pub fn system(content: impl Into<String>) -> Self {
    Self::new(Role::System, content)
  }
}

/// Sampling options forwarded to the generation service
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GenerationOptions {
  /// Upper bound on response length
  pub max_output_tokens: u32,
  /// 0 is deterministic, higher values vary more
  pub temperature: f32,
}

impl Default for GenerationOptions {
  fn default() -> Self {
    Self { max_output_tokens: 1000, temperature: 0.1 }
  }
}

/// Split a conversation into prior history and the live user query.
///
/// The conversation must be non-empty and end with a non-blank user message.
pub fn split_live_query(conversation: &[Message]) -> Result<(&[Message], &Message), RagError> {
  let (last, history) = conversation
    .split_last()
    .ok_or_else(|| RagError::invalid_conversation("conversation is empty"))?;

  if last.role != Role::User {
    return Err(RagError::invalid_conversation(format!(
      "last message must come from the user, got {:?}",
      last.role
    )));
  }

  if last.content.trim().is_empty() {
    return Err(RagError::invalid_conversation("last user message is blank"));
  }

  Ok((history, last))
}
