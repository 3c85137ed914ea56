//! JWT Access Token 페이로드.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Access Token 클레임.
///
/// 발급 시점의 역할 스냅샷을 담습니다. 이후 역할이 바뀌어도
/// 이미 발급된 토큰은 만료될 때까지 그대로 유효합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject - 사용자 이름
    pub sub: String,
    /// JWT ID - 토큰 고유 식별자
    pub jti: String,
    /// 사용자 ID
    pub uid: Uuid,
    /// 발급 시점의 역할
    pub roles: Vec<String>,
    /// Issued At (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
}

impl AccessClaims {
    /// 역할 보유 여부 (대소문자 구분).
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// `now`(Unix timestamp) 기준 만료 여부.
    pub fn is_expired_at(&self, now: i64) -> bool {
        now >= self.exp
    }
}
