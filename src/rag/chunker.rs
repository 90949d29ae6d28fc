//! Splits document text into overlapping character windows.

use serde::{Deserialize, Serialize};

use crate::core::config::RetrievalSettings;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChunkerConfig {
    /// Maximum chunk size in characters
    pub chunk_size: usize,
    /// Overlap between consecutive chunks, in characters
    pub chunk_overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

impl From<&RetrievalSettings> for ChunkerConfig {
    fn from(settings: &RetrievalSettings) -> Self {
        Self {
            chunk_size: settings.chunk_size,
            chunk_overlap: settings.chunk_overlap,
        }
    }
}

/// A text chunk with its position in the source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub text: String,
    /// Character offset in the original document
    pub start_offset: usize,
    /// Chunk index within the source
    pub chunk_index: usize,
}

pub struct TextChunker {
    config: ChunkerConfig,
}

impl TextChunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self {
            config: ChunkerConfig {
                chunk_size: config.chunk_size.max(1),
                chunk_overlap: config.chunk_overlap,
            },
        }
    }

    /// Split text into overlapping chunks.
    ///
    /// Windows that are not the last one are cut at a sentence end when one
    /// falls in their final 20%. Whitespace-only windows are dropped and
    /// indices stay contiguous.
    pub fn split(&self, text: &str) -> Vec<TextChunk> {
        let chunk_size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;

        let chars: Vec<char> = text.chars().collect();
        let total_chars = chars.len();
        let mut chunks = Vec::new();

        let mut start = 0;
        while start < total_chars {
            let end = (start + chunk_size).min(total_chars);
            let window = &chars[start..end];

            let kept = if end < total_chars {
                sentence_cut(window)
            } else {
                window.len()
            };

            let chunk_text: String = window[..kept].iter().collect();
            let trimmed = chunk_text.trim();
            if !trimmed.is_empty() {
                let leading = window[..kept].iter().take_while(|c| c.is_whitespace()).count();
                chunks.push(TextChunk {
                    text: trimmed.to_string(),
                    start_offset: start + leading,
                    chunk_index: chunks.len(),
                });
            }

            if end == total_chars {
                break;
            }
            start += kept.saturating_sub(overlap).max(1);
        }

        chunks
    }
}

/// Length of `window` up to and including the last sentence terminator in
/// its final 20%, or the full window when there is none.
fn sentence_cut(window: &[char]) -> usize {
    let min_pos = window.len() * 4 / 5;

    for i in (min_pos..window.len()).rev() {
        let c = window[i];
        let at_boundary = match window.get(i + 1) {
            Some(next) => next.is_whitespace(),
            None => true,
        };
        if c == '\n' || (matches!(c, '.' | '!' | '?' | '。') && at_boundary) {
            return i + 1;
        }
    }

    window.len()
}
