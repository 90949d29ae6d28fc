//! User records and the stores that hold them.
//!
//! The app only ever reads users (and stamps `last_login`); accounts are created
//! by the `deptqa-seed-users` binary through [`seed_users`].

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::errors::ApiError;
use crate::department::Department;

pub mod mongo;
pub mod password;

pub use mongo::MongoUserStore;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub username: String,
    /// argon2 PHC string, or a bcrypt hash for accounts created by older tooling.
    pub password_hash: String,
    /// Kept as stored; parsed into [`Department`] at login so malformed records fail closed.
    pub department: String,
    pub created_at: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
}

#[derive(Debug, Error)]
pub enum UserStoreError {
    #[error("username already exists: {0}")]
    Duplicate(String),
    #[error("user store error: {0}")]
    Backend(String),
}

impl UserStoreError {
    pub fn backend<E: std::fmt::Display>(err: E) -> Self {
        UserStoreError::Backend(err.to_string())
    }
}

impl From<UserStoreError> for ApiError {
    fn from(err: UserStoreError) -> Self {
        match err {
            UserStoreError::Duplicate(name) => {
                ApiError::BadRequest(format!("Username already exists: {}", name))
            }
            UserStoreError::Backend(detail) => ApiError::Upstream(detail),
        }
    }
}

/// Usernames match case-insensitively in every lookup.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, UserStoreError>;

    async fn insert_user(&self, user: UserRecord) -> Result<(), UserStoreError>;

    async fn record_login(&self, username: &str, at: DateTime<Utc>) -> Result<(), UserStoreError>;

    async fn ping(&self) -> Result<(), UserStoreError>;
}

pub fn normalize_username(username: &str) -> String {
    username.trim().to_lowercase()
}

/// An account to create: `username:password:department` on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedAccount {
    pub username: String,
    pub password: String,
    pub department: Department,
}

impl SeedAccount {
    pub fn new(username: &str, password: &str, department: Department) -> Self {
        Self {
            username: normalize_username(username),
            password: password.to_string(),
            department,
        }
    }
}

impl FromStr for SeedAccount {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (username, rest) = s.split_once(':').ok_or_else(|| {
            ApiError::BadRequest(format!(
                "Expected username:password:department, got '{}'",
                s
            ))
        })?;
        let (password, department) = rest.rsplit_once(':').ok_or_else(|| {
            ApiError::BadRequest(format!(
                "Expected username:password:department, got '{}'",
                s
            ))
        })?;

        if username.trim().is_empty() || password.is_empty() {
            return Err(ApiError::BadRequest(
                "Username and password must not be empty".to_string(),
            ));
        }

        Ok(SeedAccount::new(username, password, department.parse()?))
    }
}

/// The sample accounts shipped for demos.
pub fn default_accounts() -> Vec<SeedAccount> {
    vec![
        SeedAccount::new("tony", "password123", Department::Engineering),
        SeedAccount::new("bruce", "securepass", Department::Marketing),
        SeedAccount::new("sam", "financepass", Department::Finance),
        SeedAccount::new("peter", "pete123", Department::Engineering),
        SeedAccount::new("sid", "sidpass123", Department::Marketing),
        SeedAccount::new("natasha", "hrpass123", Department::Hr),
    ]
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct SeedReport {
    pub created: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
}

impl SeedReport {
    pub fn total(&self) -> usize {
        self.created + self.skipped + self.errors.len()
    }
}

/// Creates each account, treating already-present usernames as skipped.
pub async fn seed_users(store: &dyn UserStore, accounts: &[SeedAccount]) -> SeedReport {
    let mut report = SeedReport::default();

    for account in accounts {
        let password_hash = match password::hash_password(&account.password) {
            Ok(hash) => hash,
            Err(err) => {
                report
                    .errors
                    .push(format!("Failed to hash password for {}: {}", account.username, err));
                continue;
            }
        };

        let record = UserRecord {
            username: account.username.clone(),
            password_hash,
            department: account.department.as_str().to_string(),
            created_at: Some(Utc::now()),
            last_login: None,
        };

        match store.insert_user(record).await {
            Ok(()) => {
                tracing::info!(
                    "Created user {} ({})",
                    account.username,
                    account.department
                );
                report.created += 1;
            }
            Err(UserStoreError::Duplicate(_)) => {
                tracing::warn!("Username already exists: {}", account.username);
                report.skipped += 1;
            }
            Err(err) => {
                tracing::error!("Error adding user {}: {}", account.username, err);
                report
                    .errors
                    .push(format!("Failed to add user {}: {}", account.username, err));
            }
        }
    }

    tracing::info!(
        "User initialization complete. Created {}/{} ({} already present)",
        report.created,
        report.total(),
        report.skipped
    );
    if !report.errors.is_empty() {
        tracing::warn!(
            "Encountered {} errors during user initialization",
            report.errors.len()
        );
    }

    report
}
