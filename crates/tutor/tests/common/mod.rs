//! Hand-written backends shared by the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tutor::config::{Settings, StoreProvider};
use tutor::error::RagError;
use tutor::server::models::conversation::{GenerationOptions, Message};
use tutor::server::models::record::EmbeddingPurpose;
use tutor::server::models::review::Review;
use tutor::server::services::embeddings::EmbeddingClient;
use tutor::server::services::generation::{ChunkStream, GenerationClient};

pub const DIMENSION: usize = 16;

/// Bag-of-words vector: texts sharing words point the same way
pub fn keyword_vector(text: &str, dimension: usize) -> Vec<f32> {
  let mut vector = vec![0.0; dimension];
  for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| w.len() > 2) {
    let bucket = word.to_lowercase().bytes().map(usize::from).sum::<usize>() % dimension;
    vector[bucket] += 1.0;
  }
  vector
}

/// Deterministic embedder that can be told to fail on its n-th call (1-based)
pub struct FakeEmbedder {
  dimension: usize,
  fail_on_call: Option<usize>,
  calls: AtomicUsize,
  purposes: Mutex<Vec<EmbeddingPurpose>>,
}

impl FakeEmbedder {
  pub fn new() -> Self {
    Self { dimension: DIMENSION, fail_on_call: None, calls: AtomicUsize::new(0), purposes: Mutex::new(Vec::new()) }
  }

  pub fn failing_on(call: usize) -> Self {
    Self { fail_on_call: Some(call), ..Self::new() }
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }

  pub fn purposes(&self) -> Vec<EmbeddingPurpose> {
    self.purposes.lock().unwrap().clone()
  }
}

#[async_trait]
impl EmbeddingClient for FakeEmbedder {
  async fn embed(&self, text: &str, purpose: EmbeddingPurpose) -> Result<Vec<f32>, RagError> {
    let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
    self.purposes.lock().unwrap().push(purpose);

    if self.fail_on_call == Some(call) {
      return Err(RagError::embedding_service("503 Service Unavailable"));
    }
    Ok(keyword_vector(text, self.dimension))
  }

  fn dimension(&self) -> usize {
    self.dimension
  }

  fn model_id(&self) -> String {
    "fake-embedder".to_string()
  }
}

#[derive(Debug, Clone)]
pub enum Step {
  Chunk(&'static str),
  Fail(&'static str),
  /// Never yields again
  Hang,
}

/// Sets its flag when dropped
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
  fn drop(&mut self) {
    self.0.store(true, Ordering::SeqCst);
  }
}

/// Generator that replays a script and records what it was asked
pub struct ScriptedGenerator {
  script: Vec<Step>,
  conversations: Mutex<Vec<Vec<Message>>>,
  released: Arc<AtomicBool>,
}

impl ScriptedGenerator {
  pub fn new(script: Vec<Step>) -> Self {
    Self { script, conversations: Mutex::new(Vec::new()), released: Arc::new(AtomicBool::new(false)) }
  }

  pub fn chunks(chunks: &[&'static str]) -> Self {
    Self::new(chunks.iter().map(|c| Step::Chunk(*c)).collect())
  }

  /// Conversations passed to `generate`, in call order
  pub fn conversations(&self) -> Vec<Vec<Message>> {
    self.conversations.lock().unwrap().clone()
  }

  /// Whether the last stream handed out has been dropped
  pub fn released(&self) -> bool {
    self.released.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl GenerationClient for ScriptedGenerator {
  async fn generate(&self, conversation: &[Message], _options: &GenerationOptions) -> Result<ChunkStream, RagError> {
    self.conversations.lock().unwrap().push(conversation.to_vec());

    let guard = DropFlag(self.released.clone());
    let script = self.script.clone();

    let stream = stream::iter(script)
      .take_while(|step| futures::future::ready(!matches!(step, Step::Hang)))
      .map(|step| match step {
        Step::Chunk(text) => Ok(text.to_string()),
        Step::Fail(message) => Err(RagError::generation_stream(message)),
        Step::Hang => unreachable!(),
      });

    let hangs = self.script.iter().any(|step| matches!(step, Step::Hang));
    let tail: ChunkStream = if hangs { stream::pending().boxed() } else { stream::empty().boxed() };

    Ok(
      stream
        .chain(tail)
        .map(move |item| {
          let _held = &guard;
          item
        })
        .boxed(),
    )
  }

  fn model_id(&self) -> String {
    "scripted-generator".to_string()
  }
}

pub fn sample_reviews() -> Vec<Review> {
  vec![
    Review::new("Dr. Emily Johnson", "Chemistry 101", "Known for engaging chemistry lectures and clear explanations", 4.5),
    Review::new("Dr. Robert Davis", "Art History", "Slides are dull and grading is slow", 2.0),
    Review::new("Dr. Laura Garcia", "Calculus", "Tough exams but fair, lots of practice problems", 3.5),
  ]
}

pub fn memory_settings() -> Settings {
  let mut settings = Settings::default();
  settings.store.provider = StoreProvider::Memory;
  settings.embedding.dimension = DIMENSION;
  settings
}
