//! 인메모리 자격증명 저장소.
//!
//! 테스트와 단일 프로세스 개발 환경용. 모든 변경은 하나의 쓰기 락 안에서
//! await 없이 끝나므로 각 메서드가 그대로 원자적 연산이 됩니다.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{CredentialStore, RotateOutcome, SuccessorToken};
use crate::domain::{RefreshTokenRecord, TokenState, User};
use crate::error::StoreError;

#[derive(Debug, Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    /// username → user id
    usernames: HashMap<String, Uuid>,
    /// token_hash → record
    refresh_tokens: HashMap<String, RefreshTokenRecord>,
}

/// 인메모리 저장소.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    inner: RwLock<Inner>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 저장된 리프레시 토큰 수 (테스트/진단용).
    pub async fn refresh_token_count(&self) -> usize {
        self.inner.read().await.refresh_tokens.len()
    }

    /// 사용자의 사용 가능한 리프레시 토큰 수.
    pub async fn usable_refresh_tokens(&self, user_id: Uuid, now: DateTime<Utc>) -> usize {
        self.inner
            .read()
            .await
            .refresh_tokens
            .values()
            .filter(|t| t.user_id == user_id && t.is_usable(now))
            .count()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if inner.usernames.contains_key(&user.username) {
            return Err(StoreError::Conflict(user.username.clone()));
        }
        inner.usernames.insert(user.username.clone(), user.id);
        inner.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .usernames
            .get(username)
            .and_then(|id| inner.users.get(id))
            .cloned())
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.inner.read().await.users.get(&user_id).cloned())
    }

    async fn add_role(&self, user_id: Uuid, role: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        let user = inner
            .users
            .get_mut(&user_id)
            .ok_or_else(|| StoreError::Corrupt(format!("user {} vanished", user_id)))?;
        Ok(user.roles.insert(role))
    }

    async fn remove_role(&self, user_id: Uuid, role: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        let user = inner
            .users
            .get_mut(&user_id)
            .ok_or_else(|| StoreError::Corrupt(format!("user {} vanished", user_id)))?;
        Ok(user.roles.remove(role))
    }

    async fn update_password_hash(
        &self,
        user_id: Uuid,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let user = inner
            .users
            .get_mut(&user_id)
            .ok_or_else(|| StoreError::Corrupt(format!("user {} vanished", user_id)))?;
        user.password_hash = password_hash.to_string();
        user.updated_at = now;
        Ok(())
    }

    async fn insert_refresh_token(&self, record: &RefreshTokenRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if inner.refresh_tokens.contains_key(&record.token_hash) {
            return Err(StoreError::Conflict("refresh token hash".to_string()));
        }
        inner
            .refresh_tokens
            .insert(record.token_hash.clone(), record.clone());
        Ok(())
    }

    async fn find_refresh_token(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, StoreError> {
        Ok(self.inner.read().await.refresh_tokens.get(token_hash).cloned())
    }

    async fn rotate_refresh_token(
        &self,
        token_hash: &str,
        successor: &SuccessorToken,
        now: DateTime<Utc>,
    ) -> Result<RotateOutcome, StoreError> {
        let mut inner = self.inner.write().await;

        if inner.refresh_tokens.contains_key(&successor.token_hash) {
            return Err(StoreError::Conflict("refresh token hash".to_string()));
        }

        let Some(current) = inner.refresh_tokens.get_mut(token_hash) else {
            return Ok(RotateOutcome::NotFound);
        };

        let user_id = current.user_id;
        match current.state(now) {
            TokenState::Active => {}
            TokenState::Expired => return Ok(RotateOutcome::Expired { user_id }),
            state => return Ok(RotateOutcome::AlreadyRevoked { user_id, state }),
        }

        current.mark_rotated(&successor.token_hash, now);
        let next = RefreshTokenRecord::new(
            user_id,
            successor.token_hash.clone(),
            successor.issued_at,
            successor.expires_at,
        );
        inner
            .refresh_tokens
            .insert(next.token_hash.clone(), next.clone());

        Ok(RotateOutcome::Rotated(next))
    }

    async fn revoke_refresh_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        Ok(inner
            .refresh_tokens
            .get_mut(token_hash)
            .map(|t| t.mark_revoked(now))
            .unwrap_or(false))
    }

    async fn revoke_all_refresh_tokens(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let mut inner = self.inner.write().await;
        let revoked = inner
            .refresh_tokens
            .values_mut()
            .filter(|t| t.user_id == user_id)
            .map(|t| t.mark_revoked(now))
            .filter(|changed| *changed)
            .count();
        Ok(revoked as u64)
    }

    async fn purge_expired_refresh_tokens(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut inner = self.inner.write().await;
        let before = inner.refresh_tokens.len();
        inner.refresh_tokens.retain(|_, t| t.expires_at > now);
        Ok((before - inner.refresh_tokens.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn user(name: &str) -> User {
        User::new(name, format!("{}@x", name), "$argon2id$stub", Utc::now())
    }

    fn successor(hash: &str, now: DateTime<Utc>) -> SuccessorToken {
        SuccessorToken {
            token_hash: hash.to_string(),
            issued_at: now,
            expires_at: now + Duration::days(7),
        }
    }

    #[tokio::test]
    async fn test_duplicate_username_conflicts() {
        let store = MemoryCredentialStore::new();
        store.insert_user(&user("alice")).await.unwrap();

        let result = store.insert_user(&user("alice")).await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_find_user_and_roles() {
        let store = MemoryCredentialStore::new();
        let alice = user("alice");
        store.insert_user(&alice).await.unwrap();

        assert!(store.add_role(alice.id, "Admin").await.unwrap());
        assert!(!store.add_role(alice.id, "Admin").await.unwrap());

        let found = store.find_user_by_username("alice").await.unwrap().unwrap();
        assert!(found.roles.contains("Admin"));
        assert!(found.roles.contains("User"));

        assert!(store.remove_role(alice.id, "Admin").await.unwrap());
        let found = store.find_user_by_id(alice.id).await.unwrap().unwrap();
        assert!(!found.roles.contains("Admin"));

        assert!(store.find_user_by_username("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rotate_marks_predecessor_and_links_successor() {
        let store = MemoryCredentialStore::new();
        let now = Utc::now();
        let owner = Uuid::new_v4();
        let record = RefreshTokenRecord::new(owner, "old", now, now + Duration::days(7));
        store.insert_refresh_token(&record).await.unwrap();

        let outcome = store
            .rotate_refresh_token("old", &successor("new", now), now)
            .await
            .unwrap();
        let RotateOutcome::Rotated(next) = outcome else {
            panic!("expected rotation, got {:?}", outcome);
        };
        assert_eq!(next.user_id, owner);
        assert!(next.is_usable(now));

        let old = store.find_refresh_token("old").await.unwrap().unwrap();
        assert_eq!(old.state(now), TokenState::Rotated);
        assert_eq!(old.replaced_by.as_deref(), Some("new"));

        // 두 번째 회전은 재사용
        let again = store
            .rotate_refresh_token("old", &successor("newer", now), now)
            .await
            .unwrap();
        assert_eq!(
            again,
            RotateOutcome::AlreadyRevoked {
                user_id: owner,
                state: TokenState::Rotated
            }
        );
        assert!(store.find_refresh_token("newer").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rotate_unknown_and_expired() {
        let store = MemoryCredentialStore::new();
        let now = Utc::now();
        let owner = Uuid::new_v4();

        let outcome = store
            .rotate_refresh_token("missing", &successor("x", now), now)
            .await
            .unwrap();
        assert_eq!(outcome, RotateOutcome::NotFound);

        let record = RefreshTokenRecord::new(owner, "old", now - Duration::days(8), now - Duration::days(1));
        store.insert_refresh_token(&record).await.unwrap();
        let outcome = store
            .rotate_refresh_token("old", &successor("y", now), now)
            .await
            .unwrap();
        assert_eq!(outcome, RotateOutcome::Expired { user_id: owner });
    }

    #[tokio::test]
    async fn test_revoke_all_and_purge() {
        let store = MemoryCredentialStore::new();
        let now = Utc::now();
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();

        for (hash, user) in [("a", owner), ("b", owner), ("c", other)] {
            let record = RefreshTokenRecord::new(user, hash, now, now + Duration::days(7));
            store.insert_refresh_token(&record).await.unwrap();
        }
        let stale = RefreshTokenRecord::new(other, "d", now - Duration::days(9), now - Duration::days(2));
        store.insert_refresh_token(&stale).await.unwrap();

        assert_eq!(store.revoke_all_refresh_tokens(owner, now).await.unwrap(), 2);
        assert_eq!(store.revoke_all_refresh_tokens(owner, now).await.unwrap(), 0);
        assert_eq!(store.usable_refresh_tokens(owner, now).await, 0);
        assert_eq!(store.usable_refresh_tokens(other, now).await, 1);

        assert_eq!(store.purge_expired_refresh_tokens(now).await.unwrap(), 1);
        assert_eq!(store.refresh_token_count().await, 3);
    }
}
