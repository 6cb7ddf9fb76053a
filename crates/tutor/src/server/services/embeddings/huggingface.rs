//! Hugging Face Inference API feature-extraction backend

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
struct FeatureExtractionRequest<'a> {
  inputs: &'a str,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FeatureExtractionResponse {
  Pooled(Vec<f32>),
  Batched(Vec<Vec<f32>>),
}

pub struct HuggingFaceEmbeddingClient {
  client: Client,
  endpoint: String,
  api_key: Secret,
  model: String,
  dimension: usize,
}

impl HuggingFaceEmbeddingClient {
  pub fn new(settings: &EmbeddingSettings) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(settings.timeout_secs))
      .build()
      .context("Failed to create embedding HTTP client")?;

    let endpoint = format!("{}/models/{}", settings.base_url.trim_end_matches('/'), settings.model);

    Ok(Self {
      client,
      endpoint,
      api_key: settings.api_key.clone(),
      model: settings.model.clone(),
      dimension: settings.dimension,
    })
  }

  /// Text actually sent to the model. E5 models are trained with role prefixes.
  pub fn prepare_input(&self, text: &str, purpose: EmbeddingPurpose) -> String {
    if !uses_instruction_prefixes(&self.model) {
      return text.to_string();
    }
    match purpose {
      EmbeddingPurpose::Document => format!("passage: {text}"),
      EmbeddingPurpose::Query => format!("query: {text}"),
    }
  }
}

fn uses_instruction_prefixes(model: &str) -> bool {
  model.to_ascii_lowercase().contains("e5")
}

fn into_single_vector(response: FeatureExtractionResponse) -> Result<Vec<f32>, RagError> {
  match response {
    FeatureExtractionResponse::Pooled(vector) => Ok(vector),
    FeatureExtractionResponse::Batched(mut rows) if rows.len() == 1 => Ok(rows.remove(0)),
    FeatureExtractionResponse::Batched(rows) => Err(RagError::embedding_service(format!(
      "expected one pooled embedding, got {} rows",
      rows.len()
    ))),
  }
}

#[async_trait]
impl EmbeddingClient for HuggingFaceEmbeddingClient {
  async fn embed(&self, text: &str, purpose: EmbeddingPurpose) -> Result<Vec<f32>, RagError> {
    let input = self.prepare_input(text, purpose);

    let mut request = self.client.post(&self.endpoint).json(&FeatureExtractionRequest { inputs: &input });
    if !self.api_key.is_empty() {
      request = request.bearer_auth(self.api_key.expose());
    }

    let response = request
      .send()
      .await
      .map_err(|e| RagError::embedding_service(describe_transport_error(&e)))?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      tracing::warn!(%status, model = %self.model, "embedding request rejected");
      return Err(RagError::embedding_service(format!("{status}: {body}")));
    }

    let parsed: FeatureExtractionResponse = response
      .json()
      .await
      .map_err(|e| RagError::embedding_service(format!("invalid embedding response: {}", describe_transport_error(&e))))?;

    validate_dimension(self.dimension, into_single_vector(parsed)?)
  }

  fn dimension(&self) -> usize {
    self.dimension
  }

  fn model_id(&self) -> String {
    self.model.clone()
  }
}
