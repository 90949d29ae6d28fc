//! MongoDB-backed user store.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{doc, DateTime as BsonDateTime};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{ClientOptions, Collation, CollationStrength, IndexOptions};
use mongodb::{Client, Collection, IndexModel};
use serde::{Deserialize, Serialize};

use super::{UserRecord, UserStore, UserStoreError};
use crate::core::config::MongoSettings;

const USERS_COLLECTION: &str = "users";
const DUPLICATE_KEY_CODE: i32 = 11000;
const USERNAME_INDEX: &str = "username_ci";

#[derive(Debug, Serialize, Deserialize)]
struct UserDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<ObjectId>,
    username: String,
    password: String,
    #[serde(alias = "role")]
    department: String,
    #[serde(default)]
    created_at: Option<BsonDateTime>,
    #[serde(default)]
    last_login: Option<BsonDateTime>,
}

impl From<UserDocument> for UserRecord {
    fn from(doc: UserDocument) -> Self {
        UserRecord {
            username: doc.username,
            password_hash: doc.password,
            department: doc.department,
            created_at: doc.created_at.and_then(to_chrono),
            last_login: doc.last_login.and_then(to_chrono),
        }
    }
}

impl From<UserRecord> for UserDocument {
    fn from(record: UserRecord) -> Self {
        UserDocument {
            id: None,
            username: record.username,
            password: record.password_hash,
            department: record.department,
            created_at: record.created_at.map(to_bson),
            last_login: record.last_login.map(to_bson),
        }
    }
}

/// Compares usernames ignoring case, so "Tony" and "tony" are one account.
fn username_collation() -> Collation {
    Collation::builder()
        .locale("en".to_string())
        .strength(CollationStrength::Secondary)
        .build()
}

fn to_chrono(value: BsonDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(value.timestamp_millis())
}

fn to_bson(value: DateTime<Utc>) -> BsonDateTime {
    BsonDateTime::from_millis(value.timestamp_millis())
}

#[derive(Clone)]
pub struct MongoUserStore {
    client: Client,
    users: Collection<UserDocument>,
}

impl MongoUserStore {
    /// Connects, pings the server and ensures the unique username index.
    pub async fn connect(settings: &MongoSettings) -> Result<Self, UserStoreError> {
        let uri = settings
            .uri
            .as_deref()
            .filter(|uri| !uri.trim().is_empty())
            .ok_or_else(|| UserStoreError::Backend("MONGO_URI is not set".to_string()))?;

        let mut options = ClientOptions::parse(uri)
            .await
            .map_err(UserStoreError::backend)?;
        options.app_name = Some("deptqa".to_string());
        options.server_selection_timeout =
            Some(Duration::from_secs(settings.server_selection_timeout_secs));
        options.connect_timeout = Some(Duration::from_secs(settings.connect_timeout_secs));

        let client = Client::with_options(options).map_err(UserStoreError::backend)?;
        let users = client
            .database(&settings.database)
            .collection::<UserDocument>(USERS_COLLECTION);

        let store = Self { client, users };
        store.ping().await?;
        store.create_indexes().await;

        tracing::info!(
            "Connected to MongoDB database '{}'",
            settings.database
        );
        Ok(store)
    }

    /// A database holding usernames that differ only by case cannot take
    /// the index; startup continues and lookups stay case-insensitive.
    async fn create_indexes(&self) {
        let index = IndexModel::builder()
            .keys(doc! { "username": 1 })
            .options(
                IndexOptions::builder()
                    .name(USERNAME_INDEX.to_string())
                    .unique(true)
                    .collation(username_collation())
                    .build(),
            )
            .build();

        if let Err(err) = self.users.create_index(index).await {
            tracing::warn!("Failed to create unique username index: {}", err);
        }
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == DUPLICATE_KEY_CODE
    )
}

#[async_trait]
impl UserStore for MongoUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, UserStoreError> {
        let doc = self
            .users
            .find_one(doc! { "username": username })
            .collation(username_collation())
            .await
            .map_err(UserStoreError::backend)?;
        Ok(doc.map(UserRecord::from))
    }

    async fn insert_user(&self, user: UserRecord) -> Result<(), UserStoreError> {
        let username = user.username.clone();
        match self.users.insert_one(UserDocument::from(user)).await {
            Ok(_) => Ok(()),
            Err(err) if is_duplicate_key(&err) => Err(UserStoreError::Duplicate(username)),
            Err(err) => Err(UserStoreError::backend(err)),
        }
    }

    async fn record_login(&self, username: &str, at: DateTime<Utc>) -> Result<(), UserStoreError> {
        self.users
            .update_one(
                doc! { "username": username },
                doc! { "$set": { "last_login": to_bson(at) } },
            )
            .collation(username_collation())
            .await
            .map_err(UserStoreError::backend)?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), UserStoreError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(UserStoreError::backend)?;
        Ok(())
    }
}
