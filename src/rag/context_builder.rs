//! Formats retrieved chunks into the context block of an LLM prompt.

use super::store::ChunkSearchResult;

#[derive(Debug, Clone)]
pub struct ContextBuilderConfig {
    /// Maximum total context length in characters
    pub max_context_length: usize,
}

impl Default for ContextBuilderConfig {
    fn default() -> Self {
        Self {
            max_context_length: 6000,
        }
    }
}

pub struct ContextBuilder {
    config: ContextBuilderConfig,
}

impl ContextBuilder {
    pub fn new(config: ContextBuilderConfig) -> Self {
        Self { config }
    }

    /// Numbered passages in retrieval order. Stops before the passage that
    /// would push the context over `max_context_length`, but always keeps
    /// the first one.
    pub fn format_context(&self, results: &[ChunkSearchResult]) -> String {
        let mut context = String::new();
        let mut current_length = 0;

        for (i, result) in results.iter().enumerate() {
            let entry = format!(
                "[{}] (Source: {}, relevance: {:.2})\n{}\n\n",
                i + 1,
                result.chunk.source,
                result.score,
                result.chunk.content.trim()
            );

            let entry_length = entry.chars().count();
            if i > 0 && current_length + entry_length > self.config.max_context_length {
                break;
            }

            context.push_str(&entry);
            current_length += entry_length;
        }

        context.trim().to_string()
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new(ContextBuilderConfig::default())
    }
}
