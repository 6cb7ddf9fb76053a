//! Pinecone data-plane backend
//!
//! Talks to the index host directly over REST. Upserts are split into
//! requests of `upsert_batch_size` vectors, the most Pinecone accepts per call.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::{Secret, StoreSettings};
use crate::error::{describe_transport_error, RagError};
use crate::server::models::record::{RetrievalMatch, ReviewMetadata, VectorRecord};
use crate::server::services::vector_database::{rank_matches, VectorStore};

const API_VERSION: &str = "2024-07";

#[derive(Serialize)]
struct UpsertRequest<'a> {
  vectors: Vec<PineconeVector<'a>>,
  namespace: &'a str,
}

#[derive(Serialize)]
struct PineconeVector<'a> {
  id: &'a str,
  values: &'a [f32],
  metadata: &'a ReviewMetadata,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
  #[serde(default)]
  upserted_count: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
  vector: &'a [f32],
  top_k: usize,
  namespace: &'a str,
  include_metadata: bool,
  include_values: bool,
}

#[derive(Deserialize)]
struct QueryResponse {
  #[serde(default)]
  matches: Vec<QueryMatch>,
}

#[derive(Deserialize)]
struct QueryMatch {
  id: String,
  #[serde(default)]
  score: f32,
  metadata: Option<serde_json::Value>,
}

pub struct PineconeVectorStore {
  client: Client,
  host: String,
  namespace: String,
  api_key: Secret,
  batch_size: usize,
}

impl PineconeVectorStore {
  pub fn new(settings: &StoreSettings) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(settings.timeout_secs))
      .build()
      .context("Failed to create Pinecone HTTP client")?;

    let host = normalize_host(&settings.index_host);
    url::Url::parse(&host).with_context(|| format!("Invalid Pinecone index host '{host}'"))?;

    Ok(Self {
      client,
      host,
      namespace: settings.namespace.clone(),
      api_key: settings.api_key.clone(),
      batch_size: settings.upsert_batch_size.max(1),
    })
  }

  fn request(&self, path: &str) -> reqwest::RequestBuilder {
    self
      .client
      .post(format!("{}{path}", self.host))
      .header("Api-Key", self.api_key.expose())
      .header("X-Pinecone-API-Version", API_VERSION)
  }

  async fn upsert_chunk(&self, chunk: &[VectorRecord]) -> Result<(), String> {
    let body = UpsertRequest {
      vectors: chunk
        .iter()
        .map(|r| PineconeVector { id: &r.id, values: &r.values, metadata: &r.metadata })
        .collect(),
      namespace: &self.namespace,
    };

    let response =
      self.request("/vectors/upsert").json(&body).send().await.map_err(|e| describe_transport_error(&e))?;

    let status = response.status();
    if !status.is_success() {
      let text = response.text().await.unwrap_or_default();
      return Err(format!("{status}: {text}"));
    }

    let parsed: UpsertResponse =
      response.json().await.map_err(|e| format!("invalid upsert response: {}", describe_transport_error(&e)))?;
    if parsed.upserted_count != chunk.len() {
      return Err(format!("index acknowledged {} of {} vectors", parsed.upserted_count, chunk.len()));
    }
    Ok(())
  }
}

/// Index hosts are shown without a scheme in the Pinecone console
fn normalize_host(host: &str) -> String {
  let host = host.trim().trim_end_matches('/');
  if host.starts_with("http://") || host.starts_with("https://") {
    host.to_string()
  } else {
    format!("https://{host}")
  }
}

fn parse_match(raw: QueryMatch) -> Result<RetrievalMatch, RagError> {
  let metadata = raw
    .metadata
    .ok_or_else(|| RagError::store_read(format!("match '{}' has no metadata", raw.id)))?;
  let metadata: ReviewMetadata = serde_json::from_value(metadata)
    .map_err(|e| RagError::store_read(format!("match '{}' has malformed metadata: {e}", raw.id)))?;

  Ok(RetrievalMatch { id: raw.id, score: raw.score, metadata })
}

#[async_trait]
impl VectorStore for PineconeVectorStore {
  async fn upsert(&self, records: Vec<VectorRecord>) -> Result<(), RagError> {
    let mut committed = 0;

    for chunk in records.chunks(self.batch_size) {
      if let Err(message) = self.upsert_chunk(chunk).await {
        let failed_ids: Vec<String> = records[committed..].iter().map(|r| r.id.clone()).collect();
        tracing::error!(committed, failed = failed_ids.len(), %message, "pinecone upsert failed");
        return Err(RagError::store_write(
          format!("{message} ({committed} earlier record(s) were committed)"),
          failed_ids,
        ));
      }
      committed += chunk.len();
    }

    tracing::debug!(committed, namespace = %self.namespace, "pinecone upsert complete");
    Ok(())
  }

  async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<RetrievalMatch>, RagError> {
    if k == 0 {
      return Ok(Vec::new());
    }

    let body = QueryRequest {
      vector,
      top_k: k,
      namespace: &self.namespace,
      include_metadata: true,
      include_values: false,
    };

    let response = self
      .request("/query")
      .json(&body)
      .send()
      .await
      .map_err(|e| RagError::store_read(describe_transport_error(&e)))?;

    let status = response.status();
    if !status.is_success() {
      let text = response.text().await.unwrap_or_default();
      return Err(RagError::store_read(format!("{status}: {text}")));
    }

    let parsed: QueryResponse = response
      .json()
      .await
      .map_err(|e| RagError::store_read(format!("invalid query response: {}", describe_transport_error(&e))))?;

    let matches = parsed.matches.into_iter().map(parse_match).collect::<Result<Vec<_>, _>>()?;
    Ok(rank_matches(matches, k))
  }

  fn backend(&self) -> &'static str {
    "pinecone"
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use mockito::{Matcher, Server};

  fn store_for(server: &Server, batch_size: usize) -> PineconeVectorStore {
    let settings = StoreSettings {
      index_host: server.url(),
      api_key: Secret::new("pc-key"),
      upsert_batch_size: batch_size,
      timeout_secs: 5,
      ..StoreSettings::default()
    };
    PineconeVectorStore::new(&settings).unwrap()
  }

  fn record(id: &str) -> VectorRecord {
    VectorRecord {
      id: id.to_string(),
      values: vec![0.1, 0.2],
      metadata: ReviewMetadata {
        professor: Some(id.to_string()),
        review: "Great".to_string(),
        subject: "Chem".to_string(),
        stars: 4.0,
      },
    }
  }

  #[test]
  fn test_normalize_host_adds_scheme() {
    assert_eq!(normalize_host("rag-index.svc.pinecone.io/"), "https://rag-index.svc.pinecone.io");
    assert_eq!(normalize_host("http://localhost:5080"), "http://localhost:5080");
  }

  #[tokio::test]
  async fn test_upsert_sends_namespace_and_metadata() {
    let mut server = Server::new_async().await;
    let mock = server
      .mock("POST", "/vectors/upsert")
      .match_header("api-key", "pc-key")
      .match_body(Matcher::PartialJson(serde_json::json!({
        "namespace": "ns1",
        "vectors": [{"id": "Dr. A", "metadata": {"subject": "Chem", "stars": 4.0, "review": "Great"}}]
      })))
      .with_status(200)
      .with_body(r#"{"upsertedCount": 1}"#)
      .create_async()
      .await;

    store_for(&server, 100).upsert(vec![record("Dr. A")]).await.unwrap();
    mock.assert_async().await;
  }

  #[tokio::test]
  async fn test_upsert_splits_into_batches() {
    let mut server = Server::new_async().await;
    let mock = server
      .mock("POST", "/vectors/upsert")
      .with_status(200)
      .with_body(r#"{"upsertedCount": 2}"#)
      .expect(2)
      .create_async()
      .await;

    store_for(&server, 2).upsert(vec![record("a"), record("b"), record("c"), record("d")]).await.unwrap();
    mock.assert_async().await;
  }

  #[tokio::test]
  async fn test_failed_upsert_reports_unwritten_ids() {
    let mut server = Server::new_async().await;
    let _mock = server
      .mock("POST", "/vectors/upsert")
      .with_status(500)
      .with_body("boom")
      .create_async()
      .await;

    let err = store_for(&server, 100).upsert(vec![record("a"), record("b")]).await.unwrap_err();
    match err {
      RagError::StoreWrite { failed_ids, message } => {
        assert_eq!(failed_ids, vec!["a".to_string(), "b".to_string()]);
        assert!(message.contains("500"));
      }
      other => panic!("unexpected error: {other:?}"),
    }
  }

  #[tokio::test]
  async fn test_short_acknowledgement_is_a_write_error() {
    let mut server = Server::new_async().await;
    let _mock = server
      .mock("POST", "/vectors/upsert")
      .with_status(200)
      .with_body(r#"{"upsertedCount": 1}"#)
      .create_async()
      .await;

    let err = store_for(&server, 100).upsert(vec![record("a"), record("b")]).await.unwrap_err();
    assert!(matches!(err, RagError::StoreWrite { .. }));
  }

  #[tokio::test]
  async fn test_query_parses_ranked_matches() {
    let mut server = Server::new_async().await;
    let mock = server
      .mock("POST", "/query")
      .match_body(Matcher::PartialJson(serde_json::json!({"topK": 3, "includeMetadata": true})))
      .with_status(200)
      .with_body(
        r#"{"matches": [
          {"id": "Dr. B", "score": 0.61, "metadata": {"review": "ok", "subject": "Bio", "stars": 3}},
          {"id": "Dr. A", "score": 0.93, "metadata": {"review": "great", "subject": "Chemistry 101", "stars": 4.5}}
        ], "namespace": "ns1"}"#,
      )
      .create_async()
      .await;

    let matches = store_for(&server, 100).query(&[0.1, 0.2], 3).await.unwrap();

    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].id, "Dr. A");
    assert_eq!(matches[0].metadata.subject, "Chemistry 101");
    assert_eq!(matches[0].metadata.stars, 4.5);
    assert_eq!(matches[0].professor(), "Dr. A");
    mock.assert_async().await;
  }

  #[tokio::test]
  async fn test_query_empty_index() {
    let mut server = Server::new_async().await;
    let _mock = server
      .mock("POST", "/query")
      .with_status(200)
      .with_body(r#"{"matches": []}"#)
      .create_async()
      .await;

    assert!(store_for(&server, 100).query(&[0.1, 0.2], 3).await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_query_failure_is_read_error() {
    let mut server = Server::new_async().await;
    let _mock = server.mock("POST", "/query").with_status(503).create_async().await;

    let err = store_for(&server, 100).query(&[0.1, 0.2], 3).await.unwrap_err();
    assert!(matches!(err, RagError::StoreRead { .. }));
  }

  #[tokio::test]
  async fn test_slow_query_times_out_as_read_error() {
    let mut server = Server::new_async().await;
    let _mock = server
      .mock("POST", "/query")
      .with_status(200)
      .with_chunked_body(|w| {
        std::thread::sleep(std::time::Duration::from_secs(2));
        w.write_all(br#"{"matches": []}"#)
      })
      .create_async()
      .await;

    let settings = StoreSettings {
      index_host: server.url(),
      api_key: Secret::new("pc-key"),
      timeout_secs: 1,
      ..StoreSettings::default()
    };
    let err = PineconeVectorStore::new(&settings).unwrap().query(&[0.1, 0.2], 3).await.unwrap_err();

    match err {
      RagError::StoreRead { message } => assert!(message.contains("timed out"), "{message}"),
      other => panic!("unexpected error: {other:?}"),
    }
  }

  #[tokio::test]
  async fn test_malformed_metadata_is_read_error() {
    let mut server = Server::new_async().await;
    let _mock = server
      .mock("POST", "/query")
      .with_status(200)
      .with_body(r#"{"matches": [{"id": "x", "score": 0.5, "metadata": {"subject": "Bio"}}]}"#)
      .create_async()
      .await;

    let err = store_for(&server, 100).query(&[0.1, 0.2], 3).await.unwrap_err();
    assert!(matches!(err, RagError::StoreRead { .. }));
  }
}
