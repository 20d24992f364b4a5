use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the directory.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String, // unique, stored as given
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 PHC string, not exposed in JSON
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Fields supplied by the caller on insert; id and timestamps come from the store.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

/// Partial update of an existing record.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Error)]
pub enum DirectoryError {
    #[error("email already registered: {0}")]
    Duplicate(String),
    #[error("user not found: {0}")]
    NotFound(Uuid),
    #[error("directory backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for DirectoryError {
    fn from(e: sqlx::Error) -> Self {
        Self::Backend(e.to_string())
    }
}
