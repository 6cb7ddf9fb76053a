//! Domain models shared by the ingestion and chat pipelines

pub mod conversation;
pub mod record;
pub mod review;
