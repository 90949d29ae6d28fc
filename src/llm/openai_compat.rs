use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::provider::LlmProvider;
use super::types::ChatRequest;
use crate::core::config::LlmSettings;
use crate::core::errors::ApiError;

/// Chat client for OpenAI-compatible endpoints (Groq by default).
#[derive(Clone)]
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: Client,
}

impl OpenAiCompatProvider {
    pub fn new(
        name: impl Into<String>,
        base_url: &str,
        api_key: String,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ApiError::internal)?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    /// `None` when no API key is configured.
    pub fn from_settings(settings: &LlmSettings) -> Result<Option<Self>, ApiError> {
        let Some(api_key) = settings
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
        else {
            return Ok(None);
        };

        Self::new(
            "groq",
            &settings.base_url,
            api_key.to_string(),
            Duration::from_secs(settings.timeout_secs),
        )
        .map(Some)
    }
}

fn chat_body(request: &ChatRequest, model_id: &str) -> Value {
    let mut body = json!({
        "model": model_id,
        "messages": request.messages,
        "stream": false,
    });

    if let Some(obj) = body.as_object_mut() {
        if let Some(t) = request.temperature {
            obj.insert("temperature".to_string(), json!(t));
        }
        if let Some(t) = request.max_tokens {
            obj.insert("max_tokens".to_string(), json!(t));
        }
    }

    body
}

fn completion_content(payload: &Value) -> Result<String, ApiError> {
    let content = payload["choices"][0]["message"]["content"]
        .as_str()
        .map(str::trim)
        .unwrap_or_default();

    if content.is_empty() {
        return Err(ApiError::Upstream(
            "chat completion returned no content".to_string(),
        ));
    }
    Ok(content.to_string())
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat(&self, request: ChatRequest, model_id: &str) -> Result<String, ApiError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = chat_body(&request, model_id);

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
                "{} chat error ({}): {}",
                self.name, status, text
            )));
        }

        let payload: Value = res.json().await.map_err(ApiError::upstream)?;
        completion_content(&payload)
    }
}
