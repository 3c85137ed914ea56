//! 리프레시 토큰 레코드와 상태.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 리프레시 토큰 상태.
///
/// `Active`에서만 회전할 수 있으며 나머지는 모두 종료 상태입니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenState {
    /// 사용 가능
    Active,
    /// 후속 토큰으로 교체됨
    Rotated,
    /// 만료됨
    Expired,
    /// 로그아웃/비밀번호 변경/재사용 탐지로 명시적 폐기됨
    RevokedExplicit,
}

impl TokenState {
    /// 종료 상태 여부.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TokenState::Active)
    }
}

impl std::fmt::Display for TokenState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TokenState::Active => "active",
            TokenState::Rotated => "rotated",
            TokenState::Expired => "expired",
            TokenState::RevokedExplicit => "revoked_explicit",
        };
        write!(f, "{}", s)
    }
}

/// 저장된 리프레시 토큰.
///
/// 원본 토큰 값은 저장하지 않고 SHA-256 지문(`token_hash`)만 보관합니다.
/// 소유자는 `user_id` 외래 키로만 참조합니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// false → true 단방향
    pub revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
    /// 회전 시 후속 토큰의 지문
    pub replaced_by: Option<String>,
}

impl RefreshTokenRecord {
    /// 새 Active 레코드 생성.
    pub fn new(
        user_id: Uuid,
        token_hash: impl Into<String>,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            token_hash: token_hash.into(),
            issued_at,
            expires_at,
            revoked: false,
            revoked_at: None,
            replaced_by: None,
        }
    }

    /// `now` 시점의 상태.
    ///
    /// 폐기 여부가 만료보다 우선합니다. 회전된 토큰을 만료 후에 다시 제시해도
    /// 재사용으로 판정되어야 하기 때문입니다.
    pub fn state(&self, now: DateTime<Utc>) -> TokenState {
        if self.revoked {
            if self.replaced_by.is_some() {
                TokenState::Rotated
            } else {
                TokenState::RevokedExplicit
            }
        } else if now >= self.expires_at {
            TokenState::Expired
        } else {
            TokenState::Active
        }
    }

    /// 사용 가능 여부 (`!revoked && now < expires_at`).
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.state(now) == TokenState::Active
    }

    /// 후속 토큰으로 교체된 것으로 표시합니다.
    pub(crate) fn mark_rotated(&mut self, successor_hash: &str, now: DateTime<Utc>) {
        self.revoked = true;
        self.revoked_at = Some(now);
        self.replaced_by = Some(successor_hash.to_string());
    }

    /// 명시적으로 폐기합니다. 이미 폐기된 경우 `false`.
    pub(crate) fn mark_revoked(&mut self, now: DateTime<Utc>) -> bool {
        if self.revoked {
            return false;
        }
        self.revoked = true;
        self.revoked_at = Some(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(now: DateTime<Utc>) -> RefreshTokenRecord {
        RefreshTokenRecord::new(Uuid::new_v4(), "hash", now, now + Duration::days(7))
    }

    #[test]
    fn test_state_transitions() {
        let now = Utc::now();
        let mut token = record(now);
        assert_eq!(token.state(now), TokenState::Active);
        assert!(token.is_usable(now));

        // 만료 시각 정각부터는 만료
        assert_eq!(token.state(token.expires_at), TokenState::Expired);

        token.mark_rotated("next", now);
        assert_eq!(token.state(now), TokenState::Rotated);
        assert!(token.state(now).is_terminal());
    }

    #[test]
    fn test_revocation_wins_over_expiry() {
        let now = Utc::now();
        let mut token = record(now);
        assert!(token.mark_revoked(now));
        assert!(!token.mark_revoked(now));

        let later = now + Duration::days(30);
        assert_eq!(token.state(later), TokenState::RevokedExplicit);
    }
}
