//! Gemini `embedContent` backend

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{validate_dimension, EmbeddingClient};
use crate::config::{EmbeddingSettings, Secret};
use crate::error::{describe_transport_error, RagError};
use crate::server::models::record::EmbeddingPurpose;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
  model: String,
  content: Content<'a>,
  task_type: &'static str,
}

#[derive(Serialize)]
struct Content<'a> {
  parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
  text: &'a str,
}

#[derive(Deserialize)]
struct EmbedContentResponse {
  embedding: ContentEmbedding,
}

#[derive(Deserialize)]
struct ContentEmbedding {
  values: Vec<f32>,
}

fn task_type(purpose: EmbeddingPurpose) -> &'static str {
  match purpose {
    EmbeddingPurpose::Document => "RETRIEVAL_DOCUMENT",
    EmbeddingPurpose::Query => "RETRIEVAL_QUERY",
  }
}

pub struct GeminiEmbeddingClient {
  client: Client,
  endpoint: String,
  api_key: Secret,
  model: String,
  dimension: usize,
}

impl GeminiEmbeddingClient {
  pub fn new(settings: &EmbeddingSettings) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(settings.timeout_secs))
      .build()
      .context("Failed to create embedding HTTP client")?;

    let model = settings.model.trim_start_matches("models/").to_string();
    let endpoint =
      format!("{}/v1beta/models/{}:embedContent", settings.base_url.trim_end_matches('/'), model);

    Ok(Self { client, endpoint, api_key: settings.api_key.clone(), model, dimension: settings.dimension })
  }
}

#[async_trait]
impl EmbeddingClient for GeminiEmbeddingClient {
  async fn embed(&self, text: &str, purpose: EmbeddingPurpose) -> Result<Vec<f32>, RagError> {
    let body = EmbedContentRequest {
      model: format!("models/{}", self.model),
      content: Content { parts: [Part { text }] },
      task_type: task_type(purpose),
    };

    let response = self
      .client
      .post(&self.endpoint)
      .header("x-goog-api-key", self.api_key.expose())
      .json(&body)
      .send()
      .await
      .map_err(|e| RagError::embedding_service(describe_transport_error(&e)))?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      tracing::warn!(%status, model = %self.model, "embedding request rejected");
      return Err(RagError::embedding_service(format!("{status}: {body}")));
    }

    let parsed: EmbedContentResponse = response
      .json()
      .await
      .map_err(|e| RagError::embedding_service(format!("invalid embedding response: {}", describe_transport_error(&e))))?;

    validate_dimension(self.dimension, parsed.embedding.values)
  }

  fn dimension(&self) -> usize {
    self.dimension
  }

  fn model_id(&self) -> String {
    self.model.clone()
  }
}
