//! Raw professor reviews as they arrive for ingestion

use anyhow::{Context, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::RagError;

pub const MIN_STARS: f64 = 1.0;
pub const MAX_STARS: f64 = 5.0;

/// A single student review of a professor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Review {
  /// Professor identifier (usually the display name)
  #[serde(alias = "professor_id")]
  pub professor: String,

  /// Course or subject the review refers to
  pub subject: String,

  /// Free-text review body
  #[serde(alias = "review_text")]
  pub review: String,

  /// Rating between 1 and 5
  pub stars: f64,
}

impl Review {
  pub fn new(professor: &str, subject: &str, review: &str, stars: f64) -> Self {
    Self {
      professor: professor.to_string(),
      subject: subject.to_string(),
      review: review.to_string(),
      stars,
    }
  }

  /// Check the bounds a review must satisfy before it is embedded
  pub fn validate(&self) -> Result<(), RagError> {
    if self.professor.trim().is_empty() {
      return Err(RagError::invalid_record("professor identifier is empty"));
    }
    if self.review.trim().is_empty() {
      return Err(RagError::invalid_record("review text is empty"));
    }
    if !self.stars.is_finite() || !(MIN_STARS..=MAX_STARS).contains(&self.stars) {
      return Err(RagError::invalid_record(format!(
        "stars must be between {MIN_STARS} and {MAX_STARS}, got {}",
        self.stars
      )));
    }
    Ok(())
  }
}

/// Accepted shapes for a reviews document
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ReviewsDocument {
  Wrapped { reviews: Vec<Review> },
  Bare(Vec<Review>),
}

/// Parse a reviews document, either `{"reviews": [...]}` or a bare array
pub fn parse_reviews(json: &[u8]) -> Result<Vec<Review>> {
  let document: ReviewsDocument =
    serde_json::from_slice(json).context("Reviews document is not valid JSON")?;

  Ok(match document {
    ReviewsDocument::Wrapped { reviews } => reviews,
    ReviewsDocument::Bare(reviews) => reviews,
  })
}

/// Load reviews from a JSON file on disk
pub fn load_reviews(path: &Path) -> Result<Vec<Review>> {
  let bytes = std::fs::read(path)
    .with_context(|| format!("Failed to read reviews file {}", path.display()))?;
  parse_reviews(&bytes).with_context(|| format!("Failed to parse {}", path.display()))
}
