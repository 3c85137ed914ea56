//! 리프레시 토큰 수명 관리.
//!
//! ```text
//! Active ──rotate──▶ Rotated
//!   │ ──time─────▶ Expired
//!   └ ──revoke───▶ RevokedExplicit
//! ```
//!
//! 회전은 저장소의 조건부 원자 연산 하나로 수행됩니다. 같은 토큰을 동시에
//! 회전하면 정확히 하나만 후속 토큰을 받고 나머지는 [`RefreshError::ReplayDetected`]를 봅니다.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::domain::{RefreshTokenRecord, TokenState};
use crate::error::{AuthError, StoreError};
use crate::logging::fingerprint;
use crate::store::{CredentialStore, RotateOutcome, SuccessorToken};
use crate::token::{fingerprint_refresh_token, TokenIssuer};

/// 리프레시 토큰 처리 에러.
///
/// 세부 사유는 로그 전용입니다. 외부로는 모두 [`AuthError::Unauthorized`]가 됩니다
/// (저장소 장애 제외).
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("알 수 없는 리프레시 토큰")]
    NotFound,

    #[error("폐기된 리프레시 토큰 재사용 (user={user_id}, state={state})")]
    ReplayDetected { user_id: Uuid, state: TokenState },

    #[error("만료된 리프레시 토큰 (user={user_id})")]
    Expired { user_id: Uuid },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<RefreshError> for AuthError {
    fn from(err: RefreshError) -> Self {
        match err {
            RefreshError::Store(e) => e.into(),
            _ => AuthError::Unauthorized,
        }
    }
}

/// 발급된 리프레시 토큰.
///
/// `value`는 호출자에게 한 번만 반환되며 저장소에는 `record.token_hash`만 남습니다.
#[derive(Clone)]
pub struct IssuedRefreshToken {
    pub value: String,
    pub record: RefreshTokenRecord,
}

impl std::fmt::Debug for IssuedRefreshToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedRefreshToken")
            .field("value", &"[REDACTED]")
            .field("record", &self.record)
            .finish()
    }
}

/// 리프레시 토큰 관리자.
#[derive(Clone)]
pub struct RefreshTokenManager {
    store: Arc<dyn CredentialStore>,
    issuer: Arc<TokenIssuer>,
}

impl RefreshTokenManager {
    pub fn new(store: Arc<dyn CredentialStore>, issuer: Arc<TokenIssuer>) -> Self {
        Self { store, issuer }
    }

    /// 새 Active 토큰 발급.
    pub async fn issue(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<IssuedRefreshToken, RefreshError> {
        let minted = self.issuer.mint_refresh_token(now);
        let record = RefreshTokenRecord::new(user_id, minted.token_hash, now, minted.expires_at);
        self.store.insert_refresh_token(&record).await?;

        debug!(
            user_id = %user_id,
            token = fingerprint(&record.token_hash),
            "refresh token issued"
        );
        Ok(IssuedRefreshToken {
            value: minted.value,
            record,
        })
    }

    /// 제시된 토큰을 폐기하고 같은 소유자의 후속 토큰을 발급합니다.
    pub async fn rotate(
        &self,
        presented: &str,
        now: DateTime<Utc>,
    ) -> Result<IssuedRefreshToken, RefreshError> {
        if presented.is_empty() {
            return Err(RefreshError::NotFound);
        }
        let token_hash = fingerprint_refresh_token(presented);

        let minted = self.issuer.mint_refresh_token(now);
        let successor = SuccessorToken {
            token_hash: minted.token_hash,
            issued_at: now,
            expires_at: minted.expires_at,
        };

        match self
            .store
            .rotate_refresh_token(&token_hash, &successor, now)
            .await?
        {
            RotateOutcome::Rotated(record) => {
                debug!(
                    user_id = %record.user_id,
                    from = fingerprint(&token_hash),
                    to = fingerprint(&record.token_hash),
                    "refresh token rotated"
                );
                Ok(IssuedRefreshToken {
                    value: minted.value,
                    record,
                })
            }
            RotateOutcome::NotFound => Err(RefreshError::NotFound),
            RotateOutcome::AlreadyRevoked { user_id, state } => {
                Err(RefreshError::ReplayDetected { user_id, state })
            }
            RotateOutcome::Expired { user_id } => Err(RefreshError::Expired { user_id }),
        }
    }

    /// 명시적 폐기. 알 수 없거나 이미 폐기된 토큰이면 `false`.
    pub async fn revoke(&self, presented: &str, now: DateTime<Utc>) -> Result<bool, RefreshError> {
        let token_hash = fingerprint_refresh_token(presented);
        let changed = self.store.revoke_refresh_token(&token_hash, now).await?;
        if changed {
            debug!(token = fingerprint(&token_hash), "refresh token revoked");
        }
        Ok(changed)
    }

    /// 사용자의 모든 토큰 폐기.
    pub async fn revoke_all(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<u64, RefreshError> {
        Ok(self.store.revoke_all_refresh_tokens(user_id, now).await?)
    }

    /// 만료된 토큰 정리.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, RefreshError> {
        Ok(self.store.purge_expired_refresh_tokens(now).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TokenConfig;
    use crate::store::MemoryCredentialStore;
    use chrono::Duration;

    const TEST_SECRET: &str = "test-secret-key-for-jwt-testing-minimum-32-chars";

    fn manager() -> (Arc<MemoryCredentialStore>, RefreshTokenManager) {
        let store = Arc::new(MemoryCredentialStore::new());
        let issuer = Arc::new(TokenIssuer::new(&TokenConfig::new(TEST_SECRET)).unwrap());
        let manager = RefreshTokenManager::new(store.clone(), issuer);
        (store, manager)
    }

    #[tokio::test]
    async fn test_issue_stores_only_fingerprint() {
        let (store, manager) = manager();
        let now = Utc::now();
        let user_id = Uuid::new_v4();

        let issued = manager.issue(user_id, now).await.unwrap();
        assert!(store.find_refresh_token(&issued.value).await.unwrap().is_none());

        let stored = store
            .find_refresh_token(&fingerprint_refresh_token(&issued.value))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.user_id, user_id);
        assert_eq!(stored.expires_at, now + Duration::days(7));
    }

    #[tokio::test]
    async fn test_rotate_once_then_replay() {
        let (_, manager) = manager();
        let now = Utc::now();
        let user_id = Uuid::new_v4();
        let first = manager.issue(user_id, now).await.unwrap();

        let second = manager.rotate(&first.value, now).await.unwrap();
        assert_eq!(second.record.user_id, user_id);
        assert_ne!(second.value, first.value);

        let replay = manager.rotate(&first.value, now).await;
        assert!(matches!(
            replay,
            Err(RefreshError::ReplayDetected {
                state: TokenState::Rotated,
                ..
            })
        ));

        // 후속 토큰은 여전히 사용 가능
        assert!(manager.rotate(&second.value, now).await.is_ok());
    }

    #[tokio::test]
    async fn test_rotate_unknown_and_empty() {
        let (_, manager) = manager();
        let now = Utc::now();
        assert!(matches!(
            manager.rotate("never-issued", now).await,
            Err(RefreshError::NotFound)
        ));
        assert!(matches!(manager.rotate("", now).await, Err(RefreshError::NotFound)));
    }

    #[tokio::test]
    async fn test_rotate_expired() {
        let (_, manager) = manager();
        let now = Utc::now();
        let issued = manager.issue(Uuid::new_v4(), now).await.unwrap();

        let later = now + Duration::days(7);
        assert!(matches!(
            manager.rotate(&issued.value, later).await,
            Err(RefreshError::Expired { .. })
        ));
    }

    #[tokio::test]
    async fn test_revoked_token_is_replay() {
        let (_, manager) = manager();
        let now = Utc::now();
        let issued = manager.issue(Uuid::new_v4(), now).await.unwrap();

        assert!(manager.revoke(&issued.value, now).await.unwrap());
        assert!(!manager.revoke(&issued.value, now).await.unwrap());
        assert!(!manager.revoke("unknown", now).await.unwrap());

        assert!(matches!(
            manager.rotate(&issued.value, now).await,
            Err(RefreshError::ReplayDetected {
                state: TokenState::RevokedExplicit,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_revoke_all_and_purge() {
        let (store, manager) = manager();
        let now = Utc::now();
        let user_id = Uuid::new_v4();
        manager.issue(user_id, now).await.unwrap();
        manager.issue(user_id, now).await.unwrap();

        assert_eq!(manager.revoke_all(user_id, now).await.unwrap(), 2);
        assert_eq!(store.usable_refresh_tokens(user_id, now).await, 0);

        assert_eq!(manager.purge_expired(now).await.unwrap(), 0);
        assert_eq!(
            manager.purge_expired(now + Duration::days(8)).await.unwrap(),
            2
        );
    }

    #[test]
    fn test_refresh_errors_collapse_to_unauthorized() {
        let replay: AuthError = RefreshError::ReplayDetected {
            user_id: Uuid::new_v4(),
            state: TokenState::Rotated,
        }
        .into();
        assert!(matches!(replay, AuthError::Unauthorized));

        let down: AuthError = RefreshError::Store(StoreError::Unavailable("down".into())).into();
        assert!(matches!(down, AuthError::Unavailable(_)));
    }
}
