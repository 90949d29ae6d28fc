use std::sync::Arc;

use super::store::{ChunkSearchResult, RagStore};
use crate::core::errors::ApiError;
use crate::department::Department;
use crate::llm::embedding::{EmbedInputType, Embedder};

/// Embeds queries and searches the index within a single department.
pub struct Retriever {
    store: Arc<dyn RagStore>,
    embedder: Arc<dyn Embedder>,
    top_k: usize,
}

impl Retriever {
    pub fn new(store: Arc<dyn RagStore>, embedder: Arc<dyn Embedder>, top_k: usize) -> Self {
        Self {
            store,
            embedder,
            top_k: top_k.max(1),
        }
    }

    pub async fn retrieve(
        &self,
        query: &str,
        department: Department,
    ) -> Result<Vec<ChunkSearchResult>, ApiError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        if self.store.count(Some(department)).await? == 0 {
            tracing::debug!("No indexed documents for {}", department);
            return Ok(Vec::new());
        }

        let embeddings = self
            .embedder
            .embed(&[query.to_string()], EmbedInputType::Query)
            .await?;
        let query_embedding = embeddings
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::Upstream("no embedding returned for query".to_string()))?;

        let mut results = self
            .store
            .search(&query_embedding, self.top_k, department)
            .await?;

        let before = results.len();
        results.retain(|r| r.chunk.department == department);
        if results.len() != before {
            tracing::error!(
                "Dropped {} chunks outside {} from search results",
                before - results.len(),
                department
            );
        }

        tracing::debug!(
            "Retrieved {} chunks for {} query",
            results.len(),
            department
        );
        Ok(results)
    }
}
