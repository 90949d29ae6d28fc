//! Department-partitioned retrieval.
//!
//! This module provides:
//! - `RagStore` / `SqliteRagStore`: the persistent chunk index
//! - `TextChunker`: splits documents into overlapping chunks
//! - `ContextBuilder`: formats retrieved chunks for the LLM prompt
//! - `Retriever`: embeds a query and searches one department

pub mod chunker;
pub mod context_builder;
pub mod retriever;
pub mod sqlite;
pub mod store;

pub use chunker::{ChunkerConfig, TextChunk, TextChunker};
pub use context_builder::ContextBuilder;
pub use retriever::Retriever;
pub use sqlite::SqliteRagStore;
pub use store::{ChunkScope, ChunkSearchResult, DepartmentCount, RagStore, StoredChunk};
