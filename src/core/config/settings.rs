use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Fully resolved runtime settings: defaults, then `config.yml`, then environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub storage: StorageSettings,
    pub mongo: MongoSettings,
    pub retrieval: RetrievalSettings,
    pub embedding: EmbeddingSettings,
    pub llm: LlmSettings,
    pub session: SessionSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8501,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Directory holding the persistent vector index.
    pub index_dir: PathBuf,
    /// Root of the department-partitioned document tree.
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            index_dir: PathBuf::from("vector_index"),
            data_dir: PathBuf::from("resources/data"),
            log_dir: PathBuf::from("logs"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MongoSettings {
    pub uri: Option<String>,
    pub database: String,
    pub server_selection_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for MongoSettings {
    fn default() -> Self {
        Self {
            uri: None,
            database: "rag_system".to_string(),
            server_selection_timeout_secs: 5,
            connect_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub top_k: usize,
    /// Chunk window in characters.
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub embed_batch_size: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: 3,
            chunk_size: 1000,
            chunk_overlap: 200,
            embed_batch_size: 96,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "embed-english-v3.0".to_string(),
            base_url: "https://api.cohere.com".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// When absent the answer generator falls back to extractive answers.
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub temperature: f64,
    pub max_tokens: Option<u32>,
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "openai/gpt-oss-120b".to_string(),
            base_url: "https://api.groq.com/openai".to_string(),
            temperature: 0.5,
            max_tokens: None,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub ttl_minutes: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self { ttl_minutes: 12 * 60 }
    }
}
