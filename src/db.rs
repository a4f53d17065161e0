use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use time::OffsetDateTime;
use tracing::warn;

use crate::models::{
    friend::Friend,
    store::{Store, StoreError},
    user::User,
};

const USER_COLUMNS: &str =
    "id, name, email, password_hash, remember_hash, created_at, updated_at";
const FRIEND_COLUMNS: &str = "id, user_id, friend_id, status, created_at, updated_at";

/// PostgreSQL-backed `Store`.
#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .context("connect to database")?;

        if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
            warn!(error = %e, "migration failed; continuing");
        }
        Ok(Self { db })
    }

    async fn find_user(&self, column: &str, value: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE {column} = $1"
        ))
        .bind(value)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn user_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.find_user("email", email).await
    }

    async fn user_by_remember_hash(&self, remember_hash: &str) -> Result<Option<User>, StoreError> {
        self.find_user("remember_hash", remember_hash).await
    }

    async fn create_user(&self, user: &mut User) -> Result<(), StoreError> {
        let (id, created_at, updated_at) = sqlx::query_as::<_, (i64, OffsetDateTime, OffsetDateTime)>(
            r#"
            INSERT INTO users (name, email, password_hash, remember_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING id, created_at, updated_at
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.remember_hash)
        .fetch_one(&self.db)
        .await?;
        user.id = id;
        user.created_at = Some(created_at);
        user.updated_at = Some(updated_at);
        Ok(())
    }

    async fn update_user(&self, user: &mut User) -> Result<(), StoreError> {
        let updated_at = sqlx::query_scalar::<_, OffsetDateTime>(
            r#"
            UPDATE users
               SET name = $2, email = $3, password_hash = $4, remember_hash = $5,
                   updated_at = now()
             WHERE id = $1
            RETURNING updated_at
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.remember_hash)
        .fetch_optional(&self.db)
        .await?
        .ok_or(StoreError::Missing)?;
        user.updated_at = Some(updated_at);
        Ok(())
    }

    async fn delete_user(&self, id: i64) -> Result<(), StoreError> {
        let done = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        if done.rows_affected() == 0 {
            return Err(StoreError::Missing);
        }
        Ok(())
    }

    async fn friend_by_id(&self, id: i64) -> Result<Option<Friend>, StoreError> {
        let friend = sqlx::query_as::<_, Friend>(&format!(
            "SELECT {FRIEND_COLUMNS} FROM friends WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(friend)
    }

    async fn friends_by_user(&self, user_id: i64) -> Result<Vec<Friend>, StoreError> {
        let rows = sqlx::query_as::<_, Friend>(&format!(
            "SELECT {FRIEND_COLUMNS} FROM friends WHERE user_id = $1 ORDER BY created_at ASC"
        ))
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn create_friend(&self, friend: &mut Friend) -> Result<(), StoreError> {
        let (id, created_at, updated_at) = sqlx::query_as::<_, (i64, OffsetDateTime, OffsetDateTime)>(
            r#"
            INSERT INTO friends (user_id, friend_id, status)
            VALUES ($1, $2, $3)
            RETURNING id, created_at, updated_at
            "#,
        )
        .bind(friend.user_id)
        .bind(friend.friend_id)
        .bind(&friend.status)
        .fetch_one(&self.db)
        .await?;
        friend.id = id;
        friend.created_at = Some(created_at);
        friend.updated_at = Some(updated_at);
        Ok(())
    }

    async fn update_friend(&self, friend: &mut Friend) -> Result<(), StoreError> {
        let updated_at = sqlx::query_scalar::<_, OffsetDateTime>(
            r#"
            UPDATE friends
               SET user_id = $2, friend_id = $3, status = $4, updated_at = now()
             WHERE id = $1
            RETURNING updated_at
            "#,
        )
        .bind(friend.id)
        .bind(friend.user_id)
        .bind(friend.friend_id)
        .bind(&friend.status)
        .fetch_optional(&self.db)
        .await?
        .ok_or(StoreError::Missing)?;
        friend.updated_at = Some(updated_at);
        Ok(())
    }

    async fn delete_friend(&self, id: i64) -> Result<(), StoreError> {
        let done = sqlx::query("DELETE FROM friends WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        if done.rows_affected() == 0 {
            return Err(StoreError::Missing);
        }
        Ok(())
    }
}
