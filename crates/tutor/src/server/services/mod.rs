pub mod chat;
pub mod embeddings;
pub mod generation;
pub mod ingestion;
pub mod memory_store;
pub mod pinecone;
pub mod prompt;
pub mod retrieval;
pub mod vector_database;
