//! 자격증명 저장소.
//!
//! 사용자, 역할, 리프레시 토큰의 유일한 공유 가변 상태입니다.
//! 코어 로직은 [`CredentialStore`] trait에만 의존하므로 인메모리 구현과
//! PostgreSQL 구현을 코드 변경 없이 바꿔 끼울 수 있습니다.
//!
//! # 원자성 요구사항
//!
//! - `insert_user`: 사용자와 역할이 함께 보이거나 전혀 보이지 않아야 함
//! - `rotate_refresh_token`: 이전 토큰 폐기와 후속 토큰 생성이 함께 커밋되어야 하며,
//!   같은 토큰에 대한 동시 호출 중 정확히 하나만 `Rotated`를 받아야 함

mod memory;
#[cfg(feature = "postgres")]
mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{RefreshTokenRecord, TokenState, User};
use crate::error::StoreError;

pub use memory::MemoryCredentialStore;
#[cfg(feature = "postgres")]
pub use postgres::PgCredentialStore;

/// 회전 시 새로 만들 후속 토큰.
///
/// 소유자는 저장소가 이전 레코드에서 그대로 이어받습니다.
#[derive(Debug, Clone)]
pub struct SuccessorToken {
    pub token_hash: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// 회전 시도 결과.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotateOutcome {
    /// 이전 토큰을 폐기하고 후속 토큰을 생성함
    Rotated(RefreshTokenRecord),
    /// 해당 지문의 토큰이 없음
    NotFound,
    /// 이미 폐기된 토큰 (회전됨 또는 명시적 폐기)
    AlreadyRevoked { user_id: Uuid, state: TokenState },
    /// 만료된 토큰
    Expired { user_id: Uuid },
}

/// 자격증명 저장소 trait.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// 저장소 연결 확인.
    async fn ping(&self) -> Result<(), StoreError>;

    /// 사용자 생성. 사용자 이름이 이미 있으면 [`StoreError::Conflict`].
    async fn insert_user(&self, user: &User) -> Result<(), StoreError>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, StoreError>;

    /// 역할 추가. 새로 추가되었으면 `true`, 이미 있었으면 `false`.
    async fn add_role(&self, user_id: Uuid, role: &str) -> Result<bool, StoreError>;

    /// 역할 제거. 실제로 제거되었으면 `true`.
    async fn remove_role(&self, user_id: Uuid, role: &str) -> Result<bool, StoreError>;

    /// 비밀번호 해시 교체.
    async fn update_password_hash(
        &self,
        user_id: Uuid,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn insert_refresh_token(&self, record: &RefreshTokenRecord) -> Result<(), StoreError>;

    async fn find_refresh_token(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, StoreError>;

    /// 조건부 원자적 회전.
    ///
    /// 이전 토큰이 존재하고, 폐기되지 않았고, `now < expires_at`일 때만
    /// 폐기 표시(`replaced_by` 포함)와 후속 토큰 생성을 함께 수행합니다.
    async fn rotate_refresh_token(
        &self,
        token_hash: &str,
        successor: &SuccessorToken,
        now: DateTime<Utc>,
    ) -> Result<RotateOutcome, StoreError>;

    /// 명시적 폐기. 실제로 상태가 바뀌었으면 `true`.
    async fn revoke_refresh_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// 사용자의 모든 미폐기 토큰 폐기. 폐기된 개수를 반환합니다.
    async fn revoke_all_refresh_tokens(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError>;

    /// `expires_at <= now`인 토큰 삭제. 삭제된 개수를 반환합니다.
    async fn purge_expired_refresh_tokens(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;
}
