//! Hosted model clients: embeddings, chat completions and answer generation.

pub mod answer;
pub mod embedding;
pub mod openai_compat;
pub mod provider;
pub mod types;

pub use answer::{Answer, AnswerGenerator, AnswerOutcome, SourceSnippet};
pub use embedding::{CohereEmbedder, EmbedInputType, Embedder};
pub use openai_compat::OpenAiCompatProvider;
pub use provider::LlmProvider;
pub use types::{ChatMessage, ChatRequest};
