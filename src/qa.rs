//! Query pipeline: department-scoped retrieval followed by answer generation.

use std::sync::Arc;

use crate::core::errors::ApiError;
use crate::department::Department;
use crate::llm::answer::{Answer, AnswerGenerator};
use crate::rag::retriever::Retriever;

pub const MAX_QUERY_CHARS: usize = 2000;

pub struct QaService {
    retriever: Retriever,
    answers: AnswerGenerator,
}

impl QaService {
    pub fn new(retriever: Retriever, answers: AnswerGenerator) -> Self {
        Self { retriever, answers }
    }

    pub fn llm_configured(&self) -> bool {
        self.answers.is_llm_configured()
    }

    /// Retrieval failures propagate; answer generation never fails.
    pub async fn ask(&self, department: Department, query: &str) -> Result<Answer, ApiError> {
        let query = validate_query(query)?;
        let chunks = self.retriever.retrieve(query, department).await?;
        Ok(self.answers.answer(query, department, &chunks).await)
    }
}

fn validate_query(query: &str) -> Result<&str, ApiError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(ApiError::BadRequest("Please enter a question".to_string()));
    }
    if query.chars().count() > MAX_QUERY_CHARS {
        return Err(ApiError::BadRequest(format!(
            "Questions are limited to {} characters",
            MAX_QUERY_CHARS
        )));
    }
    Ok(query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::LlmSettings;
    use crate::llm::answer::AnswerOutcome;
    use crate::llm::provider::LlmProvider;
    use crate::rag::sqlite::SqliteRagStore;
    use crate::rag::store::{ChunkScope, RagStore, StoredChunk};
    use crate::testing::{FakeEmbedder, FakeLlm};

    async fn service(llm: Arc<FakeLlm>) -> (tempfile::TempDir, QaService) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SqliteRagStore::open(&dir.path().join("index.db")).await.unwrap());
        let embedder = Arc::new(FakeEmbedder::default());

        let text = "Expense reports are due on the fifth business day.";
        let chunk = StoredChunk {
            chunk_id: StoredChunk::chunk_id_for(Department::Finance, "expenses.md", 0),
            content: text.to_string(),
            source: "expenses.md".to_string(),
            department: Department::Finance,
            scope: ChunkScope::Department,
            chunk_index: 0,
            start_offset: 0,
        };
        store
            .replace_source(Department::Finance, "expenses.md", vec![(chunk, embedder.vector(text))])
            .await
            .unwrap();

        let retriever = Retriever::new(store, embedder, 3);
        let answers = AnswerGenerator::new(Some(llm as Arc<dyn LlmProvider>), &LlmSettings::default());
        (dir, QaService::new(retriever, answers))
    }

    #[tokio::test]
    async fn answers_from_department_documents() {
        let (_dir, qa) = service(Arc::new(FakeLlm::replying("On the fifth business day."))).await;

        let answer = qa.ask(Department::Finance, "When are expense reports due?").await.unwrap();
        assert_eq!(answer.outcome, AnswerOutcome::Generated);
        assert_eq!(answer.sources[0].source, "expenses.md");
    }

    #[tokio::test]
    async fn other_departments_get_no_context() {
        let llm = Arc::new(FakeLlm::replying("unused"));
        let (_dir, qa) = service(llm.clone()).await;

        let answer = qa.ask(Department::Marketing, "When are expense reports due?").await.unwrap();
        assert_eq!(answer.outcome, AnswerOutcome::NoContext);
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn rejects_blank_and_oversized_queries() {
        let (_dir, qa) = service(Arc::new(FakeLlm::replying("unused"))).await;

        assert!(matches!(qa.ask(Department::Finance, "  ").await, Err(ApiError::BadRequest(_))));
        let long = "a".repeat(MAX_QUERY_CHARS + 1);
        assert!(matches!(qa.ask(Department::Finance, &long).await, Err(ApiError::BadRequest(_))));
    }
}
