//! Storage abstraction for the department-partitioned vector index.
//!
//! Every read and write is keyed by a [`Department`]; there is no unscoped
//! search.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::core::errors::ApiError;
use crate::department::Department;

/// Whether a chunk came from the department's own folder or the shared `general` folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkScope {
    Department,
    General,
}

impl ChunkScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkScope::Department => "department",
            ChunkScope::General => "general",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "department" => Some(ChunkScope::Department),
            "general" => Some(ChunkScope::General),
            _ => None,
        }
    }
}

/// A stored chunk with metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredChunk {
    /// Deterministic identifier, see [`StoredChunk::chunk_id_for`].
    pub chunk_id: String,
    pub content: String,
    /// Source document id (file name, prefixed with `general/` for shared documents).
    pub source: String,
    pub department: Department,
    pub scope: ChunkScope,
    pub chunk_index: usize,
    /// Character offset in the source document.
    pub start_offset: usize,
}

impl StoredChunk {
    pub fn chunk_id_for(department: Department, source: &str, chunk_index: usize) -> String {
        let mut hasher = Sha256::new();
        hasher.update(department.as_str().as_bytes());
        hasher.update([0x1f]);
        hasher.update(source.as_bytes());
        hasher.update([0x1f]);
        hasher.update((chunk_index as u64).to_le_bytes());
        hex::encode(&hasher.finalize()[..16])
    }
}

/// Result of a similarity search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkSearchResult {
    pub chunk: StoredChunk,
    /// Cosine similarity (higher = better).
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepartmentCount {
    pub department: Department,
    pub chunks: usize,
    pub sources: usize,
}

#[async_trait]
pub trait RagStore: Send + Sync {
    /// Atomically replaces every chunk of `(department, source)` with `items`.
    /// Returns how many previous chunks were removed.
    async fn replace_source(
        &self,
        department: Department,
        source: &str,
        items: Vec<(StoredChunk, Vec<f32>)>,
    ) -> Result<usize, ApiError>;

    /// Top-`limit` chunks of `department` by cosine similarity to `query_embedding`.
    async fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
        department: Department,
    ) -> Result<Vec<ChunkSearchResult>, ApiError>;

    /// Removes every chunk of a department. Returns the number removed.
    async fn clear_department(&self, department: Department) -> Result<usize, ApiError>;

    async fn count(&self, department: Option<Department>) -> Result<usize, ApiError>;

    async fn department_counts(&self) -> Result<Vec<DepartmentCount>, ApiError>;

    /// Name of the embedding model the index was built with, if recorded.
    async fn embedding_model(&self) -> Result<Option<String>, ApiError>;

    async fn set_embedding_model(&self, model: &str) -> Result<(), ApiError>;
}
