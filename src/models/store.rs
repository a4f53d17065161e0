use async_trait::async_trait;
use thiserror::Error;

use crate::models::{friend::Friend, user::User};

#[derive(Debug, Error)]
pub enum StoreError {
    /// A storage-level unique constraint rejected the write.
    #[error("unique constraint `{0}` violated")]
    Conflict(String),
    /// An update or delete matched no row.
    #[error("no row matched")]
    Missing,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.is_unique_violation() {
                return StoreError::Conflict(db.constraint().unwrap_or_default().to_string());
            }
        }
        StoreError::Backend(err.into())
    }
}

/// Persistence seam for users and friend relations. Lookups return
/// `Ok(None)` when nothing matches; updates and deletes of an absent row
/// return `StoreError::Missing`.
#[async_trait]
pub trait Store: Send + Sync {
    async fn user_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;
    async fn user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    /// Expects the keyed digest, never the plaintext token.
    async fn user_by_remember_hash(&self, remember_hash: &str) -> Result<Option<User>, StoreError>;
    /// Inserts the user and backfills `id` and timestamps.
    async fn create_user(&self, user: &mut User) -> Result<(), StoreError>;
    async fn update_user(&self, user: &mut User) -> Result<(), StoreError>;
    async fn delete_user(&self, id: i64) -> Result<(), StoreError>;

    async fn friend_by_id(&self, id: i64) -> Result<Option<Friend>, StoreError>;
    async fn friends_by_user(&self, user_id: i64) -> Result<Vec<Friend>, StoreError>;
    async fn create_friend(&self, friend: &mut Friend) -> Result<(), StoreError>;
    async fn update_friend(&self, friend: &mut Friend) -> Result<(), StoreError>;
    async fn delete_friend(&self, id: i64) -> Result<(), StoreError>;
}
