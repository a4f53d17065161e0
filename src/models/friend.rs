use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

use crate::{
    error::ModelError,
    models::{
        store::Store,
        validation::{run_chain, Validate},
    },
};

pub const STATUS_PENDING: &str = "pending";

/// Directed relation from `user_id` (owner) to `friend_id`.
#[derive(Debug, Clone, Default, Serialize, FromRow)]
pub struct Friend {
    pub id: i64,
    pub user_id: i64,
    pub friend_id: i64,
    pub status: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

impl Friend {
    /// A pending request from `owner_id`; the owner always comes from the
    /// authenticated caller.
    pub fn pending(owner_id: i64, friend_id: i64) -> Self {
        Self {
            user_id: owner_id,
            friend_id,
            status: STATUS_PENDING.to_string(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FriendStep {
    UserIdRequired,
    FriendIdRequired,
    IdGreaterThanZero,
}

const WRITE_STEPS: &[FriendStep] = &[FriendStep::UserIdRequired, FriendStep::FriendIdRequired];
const DELETE_STEPS: &[FriendStep] = &[FriendStep::IdGreaterThanZero];

#[derive(Clone)]
pub struct FriendService {
    store: Arc<dyn Store>,
}

impl FriendService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn by_id(&self, id: i64) -> Result<Friend, ModelError> {
        self.store.friend_by_id(id).await?.ok_or(ModelError::NotFound)
    }

    pub async fn by_user_id(&self, user_id: i64) -> Result<Vec<Friend>, ModelError> {
        Ok(self.store.friends_by_user(user_id).await?)
    }

    pub async fn create(&self, friend: &mut Friend) -> Result<(), ModelError> {
        run_chain(self, friend, WRITE_STEPS).await?;
        self.store.create_friend(friend).await?;
        Ok(())
    }

    pub async fn update(&self, friend: &mut Friend) -> Result<(), ModelError> {
        run_chain(self, friend, WRITE_STEPS).await?;
        self.store.update_friend(friend).await?;
        Ok(())
    }

    pub async fn delete(&self, id: i64) -> Result<(), ModelError> {
        let mut friend = Friend {
            id,
            ..Friend::default()
        };
        run_chain(self, &mut friend, DELETE_STEPS).await?;
        self.store.delete_friend(id).await?;
        Ok(())
    }
}

#[async_trait]
impl Validate<Friend> for FriendService {
    type Step = FriendStep;

    async fn apply(&self, step: FriendStep, friend: &mut Friend) -> Result<(), ModelError> {
        match step {
            FriendStep::UserIdRequired if friend.user_id <= 0 => Err(ModelError::UserIdRequired),
            FriendStep::FriendIdRequired if friend.friend_id <= 0 => Err(ModelError::FriendIdRequired),
            FriendStep::IdGreaterThanZero if friend.id <= 0 => Err(ModelError::InvalidId),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::memory::MemoryStore;

    fn service() -> FriendService {
        FriendService::new(Arc::new(MemoryStore::default()))
    }

    #[tokio::test]
    async fn create_requires_owner() {
        let err = service().create(&mut Friend::pending(0, 2)).await.unwrap_err();
        assert!(matches!(err, ModelError::UserIdRequired));
    }

    #[tokio::test]
    async fn create_requires_target() {
        let err = service().create(&mut Friend::pending(1, 0)).await.unwrap_err();
        assert!(matches!(err, ModelError::FriendIdRequired));
    }

    #[tokio::test]
    async fn create_defaults_to_pending() {
        let svc = service();
        let mut friend = Friend::pending(1, 2);
        svc.create(&mut friend).await.expect("create");
        assert!(friend.id > 0);

        let stored = svc.by_id(friend.id).await.expect("stored");
        assert_eq!(stored.status, STATUS_PENDING);
        assert_eq!((stored.user_id, stored.friend_id), (1, 2));
    }

    #[tokio::test]
    async fn update_runs_same_checks() {
        let svc = service();
        let mut friend = Friend::pending(1, 2);
        svc.create(&mut friend).await.expect("create");

        friend.status = "accepted".into();
        svc.update(&mut friend).await.expect("update");
        assert_eq!(svc.by_id(friend.id).await.expect("load").status, "accepted");

        friend.friend_id = -1;
        let err = svc.update(&mut friend).await.unwrap_err();
        assert!(matches!(err, ModelError::FriendIdRequired));
    }

    #[tokio::test]
    async fn list_and_delete() {
        let svc = service();
        svc.create(&mut Friend::pending(1, 2)).await.expect("a");
        svc.create(&mut Friend::pending(1, 3)).await.expect("b");
        let mut other = Friend::pending(5, 1);
        svc.create(&mut other).await.expect("c");

        let mine = svc.by_user_id(1).await.expect("list");
        assert_eq!(mine.len(), 2);
        assert!(mine.iter().all(|f| f.user_id == 1));

        assert!(matches!(svc.delete(0).await, Err(ModelError::InvalidId)));
        svc.delete(other.id).await.expect("delete");
        assert!(matches!(svc.by_id(other.id).await, Err(ModelError::NotFound)));
        assert!(matches!(svc.delete(other.id).await, Err(ModelError::NotFound)));
    }

    #[tokio::test]
    async fn update_of_missing_relation_is_not_found() {
        let svc = service();
        let mut ghost = Friend {
            id: 99,
            ..Friend::pending(1, 2)
        };
        assert!(matches!(svc.update(&mut ghost).await, Err(ModelError::NotFound)));
        assert!(matches!(svc.by_id(99).await, Err(ModelError::NotFound)));
    }
}
