//! Turns retrieved passages and a question into an answer.
//!
//! The generator never fails: missing context, a missing API key and a
//! failing LLM each map to an [`AnswerOutcome`] with a user-facing message.

use std::sync::Arc;

use serde::Serialize;

use super::provider::LlmProvider;
use super::types::{ChatMessage, ChatRequest};
use crate::core::config::LlmSettings;
use crate::department::Department;
use crate::rag::context_builder::ContextBuilder;
use crate::rag::store::{ChunkScope, ChunkSearchResult};

const EXCERPT_CHARS: usize = 400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerOutcome {
    Generated,
    NoContext,
    Extractive,
    Degraded,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceSnippet {
    pub source: String,
    pub scope: ChunkScope,
    pub score: f32,
    pub excerpt: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub text: String,
    pub outcome: AnswerOutcome,
    pub sources: Vec<SourceSnippet>,
}

pub struct AnswerGenerator {
    provider: Option<Arc<dyn LlmProvider>>,
    model: String,
    temperature: f64,
    max_tokens: Option<u32>,
    context: ContextBuilder,
}

impl AnswerGenerator {
    pub fn new(provider: Option<Arc<dyn LlmProvider>>, settings: &LlmSettings) -> Self {
        Self {
            provider,
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            context: ContextBuilder::default(),
        }
    }

    pub fn is_llm_configured(&self) -> bool {
        self.provider.is_some()
    }

    pub async fn answer(
        &self,
        query: &str,
        department: Department,
        chunks: &[ChunkSearchResult],
    ) -> Answer {
        let sources = snippets(chunks);

        if chunks.is_empty() {
            return Answer {
                text: format!(
                    "I couldn't find any relevant information in the {} documents for that question.",
                    department.display_name()
                ),
                outcome: AnswerOutcome::NoContext,
                sources,
            };
        }

        let Some(provider) = &self.provider else {
            return Answer {
                text: extractive_text(department, &sources),
                outcome: AnswerOutcome::Extractive,
                sources,
            };
        };

        let request = ChatRequest::new(self.build_messages(query, department, chunks))
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);

        match provider.chat(request, &self.model).await {
            Ok(text) => Answer {
                text,
                outcome: AnswerOutcome::Generated,
                sources,
            },
            Err(err) => {
                tracing::warn!(
                    "LLM provider '{}' failed for {} query: {}",
                    provider.name(),
                    department,
                    err
                );
                Answer {
                    text: "I'm unable to answer right now because the language model service is \
                           unavailable. Please try again shortly."
                        .to_string(),
                    outcome: AnswerOutcome::Degraded,
                    sources,
                }
            }
        }
    }

    fn build_messages(
        &self,
        query: &str,
        department: Department,
        chunks: &[ChunkSearchResult],
    ) -> Vec<ChatMessage> {
        let system = format!(
            "You are a helpful assistant specialized in {} department documents. \
             Answer the user queries with the help of the provided context with high \
             accuracy and precision. If the context does not contain the answer, say so.",
            department
        );
        let user = format!(
            "Context:\n{}\n\nQuestion: {}",
            self.context.format_context(chunks),
            query.trim()
        );

        vec![ChatMessage::system(system), ChatMessage::user(user)]
    }
}

fn snippets(chunks: &[ChunkSearchResult]) -> Vec<SourceSnippet> {
    chunks
        .iter()
        .map(|result| SourceSnippet {
            source: result.chunk.source.clone(),
            scope: result.chunk.scope,
            score: result.score,
            excerpt: excerpt(&result.chunk.content),
        })
        .collect()
}

fn excerpt(content: &str) -> String {
    let trimmed = content.trim();
    if trimmed.chars().count() <= EXCERPT_CHARS {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(EXCERPT_CHARS).collect();
    format!("{}…", cut.trim_end())
}

fn extractive_text(department: Department, sources: &[SourceSnippet]) -> String {
    let mut text = format!(
        "Answer generation is not configured, so here are the most relevant passages from the {} documents:\n\n",
        department.display_name()
    );
    for (i, snippet) in sources.iter().enumerate() {
        let quoted: Vec<String> = snippet
            .excerpt
            .lines()
            .map(|line| format!("> {}", line))
            .collect();
        text.push_str(&format!(
            "{}. *{}*\n{}\n\n",
            i + 1,
            snippet.source,
            quoted.join("\n")
        ));
    }
    text.trim_end().to_string()
}
