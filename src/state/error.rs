use thiserror::Error;

#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("Failed to connect to the user store: {0}")]
    UserStore(#[source] anyhow::Error),

    #[error("Failed to open the vector index: {0}")]
    Rag(#[source] anyhow::Error),

    #[error("Failed to initialize the embedding client: {0}")]
    Embedding(#[source] anyhow::Error),

    #[error("Failed to initialize the LLM client: {0}")]
    Llm(#[source] anyhow::Error),
}
