//! In-memory fakes shared by unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::core::errors::ApiError;
use crate::llm::embedding::{EmbedInputType, Embedder};
use crate::llm::provider::LlmProvider;
use crate::llm::types::ChatRequest;
use crate::users::{UserRecord, UserStore, UserStoreError};

#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<String, UserRecord>>,
    offline: bool,
}

impl MemoryUserStore {
    /// A store whose every call fails like an unreachable database.
    pub fn offline() -> Self {
        Self {
            users: Mutex::new(HashMap::new()),
            offline: true,
        }
    }

    fn check_online(&self) -> Result<(), UserStoreError> {
        if self.offline {
            return Err(UserStoreError::Backend("connection refused".to_string()));
        }
        Ok(())
    }
}

// Keyed by lowercased username like the collated MongoDB lookups.
#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, UserStoreError> {
        self.check_online()?;
        Ok(self.users.lock().unwrap().get(&username.to_lowercase()).cloned())
    }

    async fn insert_user(&self, user: UserRecord) -> Result<(), UserStoreError> {
        self.check_online()?;
        let key = user.username.to_lowercase();
        let mut users = self.users.lock().unwrap();
        if users.contains_key(&key) {
            return Err(UserStoreError::Duplicate(user.username));
        }
        users.insert(key, user);
        Ok(())
    }

    async fn record_login(&self, username: &str, at: DateTime<Utc>) -> Result<(), UserStoreError> {
        self.check_online()?;
        if let Some(user) = self.users.lock().unwrap().get_mut(&username.to_lowercase()) {
            user.last_login = Some(at);
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), UserStoreError> {
        self.check_online()
    }
}

const FAKE_DIMENSIONS: usize = 256;

/// Hashed bag-of-words embedder: texts sharing words get similar vectors.
#[derive(Default)]
pub struct FakeEmbedder {
    calls: AtomicUsize,
    failing: bool,
}

impl FakeEmbedder {
    pub fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            failing: true,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn vector(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; FAKE_DIMENSIONS];
        let lowered = text.to_lowercase();
        for word in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let digest = Sha256::digest(word.as_bytes());
            let bucket = u16::from_le_bytes([digest[0], digest[1]]) as usize % FAKE_DIMENSIONS;
            vector[bucket] += 1.0;
        }
        // Keep blank texts non-zero so cosine stays defined.
        vector[0] += 0.01;
        vector
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    fn model_name(&self) -> &str {
        "fake-embed"
    }

    async fn embed(
        &self,
        inputs: &[String],
        _input_type: EmbedInputType,
    ) -> Result<Vec<Vec<f32>>, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(ApiError::Upstream("embedding service unreachable".to_string()));
        }
        Ok(inputs.iter().map(|text| self.vector(text)).collect())
    }
}

pub struct FakeLlm {
    reply: Option<String>,
    calls: AtomicUsize,
    last_request: Mutex<Option<ChatRequest>>,
}

impl FakeLlm {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<ChatRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for FakeLlm {
    fn name(&self) -> &str {
        "fake"
    }

    async fn chat(&self, request: ChatRequest, _model_id: &str) -> Result<String, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request);
        self.reply
            .clone()
            .ok_or_else(|| ApiError::Upstream("timed out waiting for completion".to_string()))
    }
}
