//! Tutor - retrieval-augmented assistant for professor reviews
//!
//! Reviews are embedded into a vector store; questions are answered by a
//! generative model that sees the closest reviews next to the question.

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod server;
