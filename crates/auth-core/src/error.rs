//! 인증 코어의 에러 타입.
//!
//! 외부 호출자에게 노출되는 [`AuthError`]와, 내부 로깅/판단에만 쓰이는
//! 저장소 에러 타입을 정의합니다. 토큰/비밀번호/리프레시 관련 세부 에러는
//! 각 모듈에 정의되어 있습니다.

use thiserror::Error;

/// 외부로 노출되는 인증 에러.
///
/// 자격증명 검증 실패와 토큰 검증 실패는 모두 [`AuthError::Unauthorized`]로
/// 합쳐집니다. 세부 사유(만료, 재사용 등)는 로그로만 남깁니다.
#[derive(Debug, Error)]
pub enum AuthError {
    /// 중복 등록
    #[error("이미 존재하는 사용자입니다: {0}")]
    Conflict(String),

    /// 잘못된 자격증명 또는 유효하지 않은 토큰
    #[error("인증에 실패했습니다")]
    Unauthorized,

    /// 인증은 되었으나 필요한 역할이 없음
    #[error("권한이 부족합니다")]
    Forbidden,

    /// 관리 작업 대상이 없음
    #[error("찾을 수 없음: {0}")]
    NotFound(String),

    /// 해석할 수 없는 요청
    #[error("잘못된 요청: {0}")]
    Malformed(String),

    /// 저장소 또는 서명 키를 사용할 수 없음
    #[error("서비스를 사용할 수 없습니다: {0}")]
    Unavailable(String),
}

/// 인증 작업을 위한 Result 타입.
pub type AuthResult<T> = Result<T, AuthError>;

impl AuthError {
    /// 에러 코드 문자열 (API 응답용).
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::Conflict(_) => "CONFLICT",
            AuthError::Unauthorized => "UNAUTHORIZED",
            AuthError::Forbidden => "FORBIDDEN",
            AuthError::NotFound(_) => "NOT_FOUND",
            AuthError::Malformed(_) => "MALFORMED",
            AuthError::Unavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }

    /// 재시도하면 성공할 수도 있는 에러인지 확인합니다.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AuthError::Unavailable(_))
    }
}

/// 자격증명 저장소 에러.
#[derive(Debug, Error)]
pub enum StoreError {
    /// 유일성 제약 위반 (사용자명, 토큰 해시)
    #[error("유일성 제약 위반: {0}")]
    Conflict(String),

    /// 저장소 연결/질의 실패
    #[error("저장소 사용 불가: {0}")]
    Unavailable(String),

    /// 저장된 데이터가 도메인 규칙과 맞지 않음
    #[error("손상된 레코드: {0}")]
    Corrupt(String),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(what) => AuthError::Conflict(what),
            StoreError::Unavailable(msg) | StoreError::Corrupt(msg) => AuthError::Unavailable(msg),
        }
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::Conflict(db.message().to_string())
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                StoreError::Corrupt(err.to_string())
            }
            _ => StoreError::Unavailable(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_conversion() {
        let conflict: AuthError = StoreError::Conflict("alice".to_string()).into();
        assert!(matches!(conflict, AuthError::Conflict(_)));

        let down: AuthError = StoreError::Unavailable("pool timeout".to_string()).into();
        assert!(down.is_retryable());
        assert_eq!(down.code(), "SERVICE_UNAVAILABLE");
    }

    #[test]
    fn test_unauthorized_message_is_generic() {
        // 사유가 메시지에 섞이지 않아야 함
        assert_eq!(AuthError::Unauthorized.to_string(), "인증에 실패했습니다");
        assert!(!AuthError::Unauthorized.is_retryable());
    }
}
