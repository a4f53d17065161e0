use std::collections::BTreeMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::Mutex;

use crate::models::{
    friend::Friend,
    store::{Store, StoreError},
    user::{User, EMAIL_CONSTRAINT},
};

/// In-process `Store` used by tests. Enforces the same unique constraints
/// as the SQL schema.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    next_id: i64,
    users: BTreeMap<i64, User>,
    friends: BTreeMap<i64, Friend>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn check_user_unique(&self, user: &User) -> Result<(), StoreError> {
        for other in self.users.values().filter(|u| u.id != user.id) {
            if other.email == user.email {
                return Err(StoreError::Conflict(EMAIL_CONSTRAINT.into()));
            }
            if other.remember_hash == user.remember_hash {
                return Err(StoreError::Conflict("users_remember_hash_key".into()));
            }
        }
        Ok(())
    }
}

/// What the database would hold: transient plaintexts are dropped.
fn persisted(user: &User) -> User {
    User {
        password: String::new(),
        remember: String::new(),
        ..user.clone()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn user_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.inner.lock().await.users.get(&id).cloned())
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let tables = self.inner.lock().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn user_by_remember_hash(&self, remember_hash: &str) -> Result<Option<User>, StoreError> {
        let tables = self.inner.lock().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.remember_hash == remember_hash)
            .cloned())
    }

    async fn create_user(&self, user: &mut User) -> Result<(), StoreError> {
        let mut tables = self.inner.lock().await;
        tables.check_user_unique(user)?;
        user.id = tables.next_id();
        let now = OffsetDateTime::now_utc();
        user.created_at = Some(now);
        user.updated_at = Some(now);
        tables.users.insert(user.id, persisted(user));
        Ok(())
    }

    async fn update_user(&self, user: &mut User) -> Result<(), StoreError> {
        let mut tables = self.inner.lock().await;
        if !tables.users.contains_key(&user.id) {
            return Err(StoreError::Missing);
        }
        tables.check_user_unique(user)?;
        user.updated_at = Some(OffsetDateTime::now_utc());
        tables.users.insert(user.id, persisted(user));
        Ok(())
    }

    async fn delete_user(&self, id: i64) -> Result<(), StoreError> {
        self.inner
            .lock()
            .await
            .users
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::Missing)
    }

    async fn friend_by_id(&self, id: i64) -> Result<Option<Friend>, StoreError> {
        Ok(self.inner.lock().await.friends.get(&id).cloned())
    }

    async fn friends_by_user(&self, user_id: i64) -> Result<Vec<Friend>, StoreError> {
        let tables = self.inner.lock().await;
        Ok(tables
            .friends
            .values()
            .filter(|f| f.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn create_friend(&self, friend: &mut Friend) -> Result<(), StoreError> {
        let mut tables = self.inner.lock().await;
        friend.id = tables.next_id();
        let now = OffsetDateTime::now_utc();
        friend.created_at = Some(now);
        friend.updated_at = Some(now);
        tables.friends.insert(friend.id, friend.clone());
        Ok(())
    }

    async fn update_friend(&self, friend: &mut Friend) -> Result<(), StoreError> {
        let mut tables = self.inner.lock().await;
        if !tables.friends.contains_key(&friend.id) {
            return Err(StoreError::Missing);
        }
        friend.updated_at = Some(OffsetDateTime::now_utc());
        tables.friends.insert(friend.id, friend.clone());
        Ok(())
    }

    async fn delete_friend(&self, id: i64) -> Result<(), StoreError> {
        self.inner
            .lock()
            .await
            .friends
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::Missing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let store = MemoryStore::default();
        let mut a = User {
            email: "a@b.com".into(),
            remember_hash: "h1".into(),
            ..User::default()
        };
        let mut b = User {
            email: "a@b.com".into(),
            remember_hash: "h2".into(),
            ..User::default()
        };
        store.create_user(&mut a).await.expect("first insert");
        let err = store.create_user(&mut b).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(c) if c == EMAIL_CONSTRAINT));
    }

    #[tokio::test]
    async fn writes_to_absent_rows_are_missing() {
        let store = MemoryStore::default();
        let mut ghost = User {
            id: 999,
            email: "ghost@b.com".into(),
            ..User::default()
        };
        assert!(matches!(store.update_user(&mut ghost).await, Err(StoreError::Missing)));
        assert!(store.user_by_id(999).await.expect("lookup").is_none());
        assert!(matches!(store.delete_user(999).await, Err(StoreError::Missing)));

        let mut friend = Friend {
            id: 7,
            user_id: 1,
            friend_id: 2,
            ..Friend::default()
        };
        assert!(matches!(store.update_friend(&mut friend).await, Err(StoreError::Missing)));
        assert!(store.friend_by_id(7).await.expect("lookup").is_none());
        assert!(matches!(store.delete_friend(7).await, Err(StoreError::Missing)));
    }
}
