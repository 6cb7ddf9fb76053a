//! Vector store records and retrieval matches

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::review::Review;

/// Which side of a retrieval an embedding is computed for.
///
/// Ingestion must embed with `Document` and retrieval with `Query`. Some
/// models encode the two differently, so passing the wrong one silently
/// degrades similarity instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmbeddingPurpose {
  Document,
  Query,
}

/// Metadata stored next to each review vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReviewMetadata {
  /// Professor display name. Older indexes may lack it, in which case the record id is used.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub professor: Option<String>,
  pub review: String,
  pub subject: String,
  pub stars: f64,
}

impl From<&Review> for ReviewMetadata {
  fn from(review: &Review) -> Self {
    Self {
      professor: Some(review.professor.clone()),
      review: review.review.clone(),
      subject: review.subject.clone(),
      stars: review.stars,
    }
  }
}

/// Entity handed to the vector store on upsert
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
  pub id: String,
  pub values: Vec<f32>,
  pub metadata: ReviewMetadata,
}

/// One ranked hit from a similarity query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RetrievalMatch {
  pub id: String,
  pub score: f32,
  pub metadata: ReviewMetadata,
}

impl RetrievalMatch {
  /// Name to show for this match
  pub fn professor(&self) -> &str {
    self.metadata.professor.as_deref().unwrap_or(&self.id)
  }
}

/// Record id for the `occurrence`-th review (zero-based) of a professor in one ingestion run
pub fn record_id(professor: &str, occurrence: usize) -> String {
  if occurrence == 0 {
    professor.to_string()
  } else {
    format!("{professor} #{}", occurrence + 1)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_record_id_is_professor_for_first_review() {
    assert_eq!(record_id("Dr. Emily Johnson", 0), "Dr. Emily Johnson");
    assert_eq!(record_id("Dr. Emily Johnson", 1), "Dr. Emily Johnson #2");
  }

  #[test]
  fn test_metadata_round_trip_keeps_subject_and_stars() {
    let metadata = ReviewMetadata::from(&Review::new("Dr. X", "Chem", "Clear.", 4.0));
    let json = serde_json::to_value(&metadata).unwrap();
    let back: ReviewMetadata = serde_json::from_value(json).unwrap();

    assert_eq!(back.subject, "Chem");
    assert_eq!(back.stars, 4.0);
  }

  #[test]
  fn test_match_falls_back_to_id_without_professor() {
    let hit = RetrievalMatch {
      id: "Dr. Legacy".into(),
      score: 0.9,
      metadata: ReviewMetadata {
        professor: None,
        review: "ok".into(),
        subject: "History".into(),
        stars: 3.0,
      },
    };
    assert_eq!(hit.professor(), "Dr. Legacy");
  }
}
