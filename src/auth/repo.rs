use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::repo_types::{DirectoryError, NewUser, User, UserUpdate};

/// Store of user identities, unique by email.
///
/// `insert` is the authoritative uniqueness check: a lookup beforehand is only
/// a pre-check and concurrent writers can still race past it.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DirectoryError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DirectoryError>;
    /// Fails with [`DirectoryError::Duplicate`] if the email is taken.
    async fn insert(&self, user: NewUser) -> Result<User, DirectoryError>;
    /// Fails with [`DirectoryError::NotFound`] if no such id.
    async fn update(&self, id: Uuid, update: UserUpdate) -> Result<User, DirectoryError>;
}

#[derive(Clone)]
pub struct PgUserDirectory {
    db: PgPool,
}

impl PgUserDirectory {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DirectoryError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DirectoryError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn insert(&self, user: NewUser) -> Result<User, DirectoryError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, name, email, password_hash, created_at, updated_at
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(&self.db)
        .await
        .map_err(|e| {
            let unique_violation = e
                .as_database_error()
                .is_some_and(|db_err| db_err.is_unique_violation());
            if unique_violation {
                DirectoryError::Duplicate(user.email.clone())
            } else {
                DirectoryError::from(e)
            }
        })
    }

    async fn update(&self, id: Uuid, update: UserUpdate) -> Result<User, DirectoryError> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET name = COALESCE($2, name),
                   updated_at = now()
             WHERE id = $1
            RETURNING id, name, email, password_hash, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(update.name)
        .fetch_optional(&self.db)
        .await?
        .ok_or(DirectoryError::NotFound(id))
    }
}

#[derive(Default)]
struct MemoryInner {
    by_id: HashMap<Uuid, User>,
    by_email: HashMap<String, Uuid>,
}

/// Process-local directory. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryUserDirectory {
    inner: RwLock<MemoryInner>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DirectoryError> {
        let inner = self.inner.read().await;
        Ok(inner
            .by_email
            .get(email)
            .and_then(|id| inner.by_id.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DirectoryError> {
        Ok(self.inner.read().await.by_id.get(&id).cloned())
    }

    async fn insert(&self, user: NewUser) -> Result<User, DirectoryError> {
        let mut inner = self.inner.write().await;
        if inner.by_email.contains_key(&user.email) {
            return Err(DirectoryError::Duplicate(user.email));
        }
        let now = OffsetDateTime::now_utc();
        let record = User {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            created_at: now,
            updated_at: now,
        };
        inner.by_email.insert(record.email.clone(), record.id);
        inner.by_id.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update(&self, id: Uuid, update: UserUpdate) -> Result<User, DirectoryError> {
        let mut inner = self.inner.write().await;
        let record = inner
            .by_id
            .get_mut(&id)
            .ok_or(DirectoryError::NotFound(id))?;
        if let Some(name) = update.name {
            record.name = name;
        }
        record.updated_at = OffsetDateTime::now_utc();
        Ok(record.clone())
    }
}
