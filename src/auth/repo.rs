use async_trait::async_trait;
use sqlx::PgPool;

use crate::auth::repo_types::{NewUser, User};

#[derive(Debug, thiserror::Error)]
pub enum UserStoreError {
    #[error("user with that credentials already exists")]
    DuplicateUser,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Persistence behind the auth flows. Lookups return an explicit `Option`
/// so callers must handle the missing-user case before touching fields.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>>;
    async fn insert(&self, user: NewUser) -> Result<User, UserStoreError>;
    async fn list_all(&self) -> anyhow::Result<Vec<User>>;
}

pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, role, is_active, created_at, updated_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn insert(&self, user: NewUser) -> Result<User, UserStoreError> {
        let inserted = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, username, email, password_hash, role, is_active)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, username, email, password_hash, role, is_active, created_at, updated_at
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role)
        .bind(user.is_active)
        .fetch_one(&self.db)
        .await
        .map_err(|e| {
            if e.as_database_error()
                .map(|db| db.is_unique_violation())
                .unwrap_or(false)
            {
                UserStoreError::DuplicateUser
            } else {
                UserStoreError::Other(e.into())
            }
        })?;
        Ok(inserted)
    }

    async fn list_all(&self) -> anyhow::Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, role, is_active, created_at, updated_at
            FROM users
            ORDER BY created_at
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(users)
    }
}
