//! In-process login sessions.
//!
//! A session is created at login, resolved from the request by the
//! [`CurrentSession`] extractor, and dropped at logout or once it has been
//! idle longer than the configured TTL.

use std::collections::HashMap;
use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::Principal;
use crate::core::errors::ApiError;
use crate::core::security::require_session_token;
use crate::llm::answer::{AnswerOutcome, SourceSnippet};
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatEntry {
    pub role: ChatRole,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<AnswerOutcome>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceSnippet>,
    pub at: DateTime<Utc>,
}

impl ChatEntry {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            outcome: None,
            sources: Vec::new(),
            at: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            outcome: None,
            sources: Vec::new(),
            at: Utc::now(),
        }
    }

    pub fn with_outcome(mut self, outcome: AnswerOutcome) -> Self {
        self.outcome = Some(outcome);
        self
    }

    pub fn with_sources(mut self, sources: Vec<SourceSnippet>) -> Self {
        self.sources = sources;
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionData {
    #[serde(skip)]
    pub token: String,
    pub principal: Principal,
    pub messages: Vec<ChatEntry>,
    pub created_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

pub fn welcome_message(username: &str) -> String {
    format!("Welcome, {}! How can I assist you today?", username)
}

#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, SessionData>>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    pub fn from_minutes(ttl_minutes: u64) -> Self {
        Self::new(Duration::minutes(ttl_minutes.min(i64::MAX as u64) as i64))
    }

    /// Starts a session whose history opens with the welcome message.
    pub async fn create(&self, principal: Principal) -> SessionData {
        let now = Utc::now();
        let session = SessionData {
            token: Uuid::new_v4().simple().to_string(),
            messages: vec![ChatEntry::assistant(welcome_message(&principal.username))],
            principal,
            created_at: now,
            last_seen: now,
        };

        let mut sessions = self.sessions.write().await;
        let ttl = self.ttl;
        sessions.retain(|_, s| !is_expired(s, ttl, now));
        sessions.insert(session.token.clone(), session.clone());
        session
    }

    pub async fn get(&self, token: &str) -> Option<SessionData> {
        self.get_at(token, Utc::now()).await
    }

    /// Returns the session and refreshes its idle timer, or drops it if it expired.
    async fn get_at(&self, token: &str, now: DateTime<Utc>) -> Option<SessionData> {
        let mut sessions = self.sessions.write().await;
        if is_expired(sessions.get(token)?, self.ttl, now) {
            sessions.remove(token);
            return None;
        }
        let session = sessions.get_mut(token)?;
        session.last_seen = now;
        Some(session.clone())
    }

    /// False when the session no longer exists.
    pub async fn append(&self, token: &str, entries: Vec<ChatEntry>) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(token) {
            Some(session) => {
                session.messages.extend(entries);
                session.last_seen = Utc::now();
                true
            }
            None => false,
        }
    }

    pub async fn remove(&self, token: &str) -> bool {
        self.sessions.write().await.remove(token).is_some()
    }

    pub async fn prune_expired(&self) -> usize {
        self.prune_expired_at(Utc::now()).await
    }

    async fn prune_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        let ttl = self.ttl;
        sessions.retain(|_, s| !is_expired(s, ttl, now));
        before - sessions.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

fn is_expired(session: &SessionData, ttl: Duration, now: DateTime<Utc>) -> bool {
    now.signed_duration_since(session.last_seen) > ttl
}

/// The session bound to the request's cookie or bearer token.
#[derive(Debug, Clone)]
pub struct CurrentSession(pub SessionData);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = require_session_token(&parts.headers)?;
        state
            .sessions
            .get(&token)
            .await
            .map(CurrentSession)
            .ok_or(ApiError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::department::Department;

    fn principal(name: &str) -> Principal {
        Principal {
            username: name.to_string(),
            department: Department::Engineering,
        }
    }

    #[tokio::test]
    async fn new_sessions_open_with_a_welcome() {
        let store = SessionStore::from_minutes(60);
        let session = store.create(principal("tony")).await;

        assert_eq!(session.messages.len(), 1);
        assert_eq!(session.messages[0].role, ChatRole::Assistant);
        assert_eq!(
            session.messages[0].content,
            "Welcome, tony! How can I assist you today?"
        );
        assert_eq!(store.get(&session.token).await.unwrap().principal, principal("tony"));
    }

    #[tokio::test]
    async fn tokens_are_unique_and_removable() {
        let store = SessionStore::from_minutes(60);
        let a = store.create(principal("tony")).await;
        let b = store.create(principal("tony")).await;
        assert_ne!(a.token, b.token);
        assert_eq!(store.len().await, 2);

        assert!(store.remove(&a.token).await);
        assert!(!store.remove(&a.token).await);
        assert!(store.get(&a.token).await.is_none());
        assert!(store.get(&b.token).await.is_some());
    }

    #[tokio::test]
    async fn append_extends_history() {
        let store = SessionStore::from_minutes(60);
        let session = store.create(principal("peter")).await;

        assert!(
            store
                .append(
                    &session.token,
                    vec![ChatEntry::user("hi"), ChatEntry::assistant("hello")],
                )
                .await
        );
        assert_eq!(store.get(&session.token).await.unwrap().messages.len(), 3);
        assert!(!store.append("missing", vec![ChatEntry::user("x")]).await);
    }

    #[tokio::test]
    async fn idle_sessions_expire() {
        let store = SessionStore::from_minutes(30);
        let session = store.create(principal("sid")).await;

        let soon = Utc::now() + Duration::minutes(10);
        assert!(store.get_at(&session.token, soon).await.is_some());

        let later = soon + Duration::minutes(31);
        assert!(store.get_at(&session.token, later).await.is_none());
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn prune_drops_only_expired_sessions() {
        let store = SessionStore::from_minutes(30);
        let first = store.create(principal("sam")).await;
        store.create(principal("bruce")).await;

        let later = Utc::now() + Duration::minutes(20);
        store.get_at(&first.token, later).await;

        let removed = store
            .prune_expired_at(later + Duration::minutes(15))
            .await;
        assert_eq!(removed, 1);
        assert!(store.get(&first.token).await.is_some());
    }
}
