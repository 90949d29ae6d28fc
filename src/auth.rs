//! Credential checks against the user store.

use std::sync::{Arc, OnceLock};

use chrono::Utc;
use serde::Serialize;

use crate::core::errors::ApiError;
use crate::department::Department;
use crate::users::password::{hash_password, verify_password};
use crate::users::{normalize_username, UserStore};

/// The authenticated identity a session is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub username: String,
    pub department: Department,
}

/// Hash checked for unknown usernames so they cost as much as a wrong password.
fn dummy_hash() -> Option<&'static str> {
    static DUMMY_HASH: OnceLock<Option<String>> = OnceLock::new();
    DUMMY_HASH
        .get_or_init(|| hash_password("deptqa-unknown-user").ok())
        .as_deref()
}

/// Runs the hash check off the async runtime. `None` verifies against the
/// dummy hash and always fails.
async fn check_password(password: &str, stored_hash: Option<String>) -> Result<bool, ApiError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || match stored_hash {
        Some(hash) => verify_password(&password, &hash),
        None => {
            if let Some(hash) = dummy_hash() {
                verify_password(&password, hash);
            }
            false
        }
    })
    .await
    .map_err(ApiError::internal)
}

pub struct Authenticator {
    users: Arc<dyn UserStore>,
}

impl Authenticator {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    /// Unknown users, wrong passwords, unparsable hashes and records with an
    /// unknown department all fail with [`ApiError::InvalidCredentials`].
    /// A user store outage is [`ApiError::Upstream`].
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Principal, ApiError> {
        let username = normalize_username(username);
        if username.is_empty() || password.is_empty() {
            return Err(ApiError::InvalidCredentials);
        }

        let record = self.users.find_by_username(&username).await?;
        let stored_hash = record.as_ref().map(|r| r.password_hash.clone());
        let verified = check_password(password, stored_hash).await?;
        let Some(record) = record else {
            tracing::info!("Login failed: unknown user '{}'", username);
            return Err(ApiError::InvalidCredentials);
        };
        if !verified {
            tracing::info!("Login failed: wrong password for '{}'", username);
            return Err(ApiError::InvalidCredentials);
        }

        let department = match record.department.parse::<Department>() {
            Ok(department) => department,
            Err(_) => {
                tracing::warn!(
                    "User '{}' has unknown department '{}'; refusing login",
                    username,
                    record.department
                );
                return Err(ApiError::InvalidCredentials);
            }
        };

        if let Err(err) = self.users.record_login(&record.username, Utc::now()).await {
            tracing::warn!("Failed to record login for '{}': {}", username, err);
        }

        tracing::info!("User '{}' logged in ({})", username, department);
        Ok(Principal {
            username,
            department,
        })
    }
}
