//! Hosted embedding client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::core::config::EmbeddingSettings;
use crate::core::errors::ApiError;

/// Cohere embeds documents and queries into different subspaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedInputType {
    Document,
    Query,
}

impl EmbedInputType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmbedInputType::Document => "search_document",
            EmbedInputType::Query => "search_query",
        }
    }
}

#[async_trait]
pub trait Embedder: Send + Sync {
    fn model_name(&self) -> &str;

    /// One vector per input, in input order.
    async fn embed(
        &self,
        inputs: &[String],
        input_type: EmbedInputType,
    ) -> Result<Vec<Vec<f32>>, ApiError>;
}

#[derive(Clone)]
pub struct CohereEmbedder {
    base_url: String,
    api_key: String,
    model: String,
    client: Client,
}

impl CohereEmbedder {
    pub fn new(
        base_url: &str,
        api_key: String,
        model: String,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ApiError::internal)?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            client,
        })
    }

    pub fn from_settings(settings: &EmbeddingSettings) -> Result<Self, ApiError> {
        let api_key = settings
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| ApiError::BadRequest("COHERE_API_KEY is not set".to_string()))?;

        Self::new(
            &settings.base_url,
            api_key.to_string(),
            settings.model.clone(),
            Duration::from_secs(settings.timeout_secs),
        )
    }
}

fn parse_embeddings(payload: &Value, expected: usize) -> Result<Vec<Vec<f32>>, ApiError> {
    // `embeddings` is a plain array for the default embedding type, or
    // `{ "float": [...] }` when embedding types are requested explicitly.
    let rows = payload["embeddings"]
        .as_array()
        .or_else(|| payload["embeddings"]["float"].as_array())
        .ok_or_else(|| ApiError::Upstream("embedding response has no embeddings".to_string()))?;

    let embeddings: Vec<Vec<f32>> = rows
        .iter()
        .map(|row| {
            row.as_array()
                .map(|vals| {
                    vals.iter()
                        .filter_map(|v| v.as_f64().map(|f| f as f32))
                        .collect()
                })
                .unwrap_or_default()
        })
        .collect();

    if embeddings.len() != expected {
        return Err(ApiError::Upstream(format!(
            "expected {} embeddings, got {}",
            expected,
            embeddings.len()
        )));
    }
    if embeddings.iter().any(Vec::is_empty) {
        return Err(ApiError::Upstream("embedding response contained an empty vector".to_string()));
    }

    Ok(embeddings)
}

#[async_trait]
impl Embedder for CohereEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(
        &self,
        inputs: &[String],
        input_type: EmbedInputType,
    ) -> Result<Vec<Vec<f32>>, ApiError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/v1/embed", self.base_url);
        let body = json!({
            "model": self.model,
            "texts": inputs,
            "input_type": input_type.as_str(),
            "truncate": "END",
        });

        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(ApiError::upstream)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Upstream(format!(
                "Cohere embed error ({}): {}",
                status, text
            )));
        }

        let payload: Value = res.json().await.map_err(ApiError::upstream)?;
        parse_embeddings(&payload, inputs.len())
    }
}
