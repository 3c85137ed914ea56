//! 통합 API 에러 응답 타입.
//!
//! 모든 엔드포인트는 [`ApiErrorResponse`] 형식으로 실패를 반환합니다.
//! 인증 코어의 [`AuthError`] 종류가 HTTP 상태 코드를 결정하며,
//! 세부 사유는 응답에 담지 않습니다.

use axum::{
    http::{header::WWW_AUTHENTICATE, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::error;

use auth_core::AuthError;

/// 통합 API 에러 응답.
///
/// # 예시
///
/// ```json
/// {
///   "code": "UNAUTHORIZED",
///   "message": "인증에 실패했습니다",
///   "timestamp": 1738300800
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    /// 에러 코드 (예: "CONFLICT", "UNAUTHORIZED", "MALFORMED")
    pub code: String,
    /// 사람이 읽을 수 있는 에러 메시지
    pub message: String,
    /// 추가 에러 상세 정보 (선택적)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    /// 에러 발생 타임스탬프 (Unix timestamp)
    pub timestamp: i64,
}

impl ApiErrorResponse {
    /// 기본 에러 생성 (타임스탬프 포함).
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }

    /// 상세 정보 포함 에러 생성.
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: Value,
    ) -> Self {
        Self {
            details: Some(details),
            ..Self::new(code, message)
        }
    }
}

impl std::fmt::Display for ApiErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// 핸들러 에러.
///
/// 상태 코드와 응답 본문을 함께 들고 다닙니다.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ApiErrorResponse,
}

impl ApiError {
    pub fn new(status: StatusCode, body: ApiErrorResponse) -> Self {
        Self { status, body }
    }

    /// 400 MALFORMED.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            ApiErrorResponse::new("MALFORMED", message),
        )
    }

    /// 400 MALFORMED (필드별 상세 포함).
    pub fn malformed_with_details(message: impl Into<String>, details: Value) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            ApiErrorResponse::with_details("MALFORMED", message, details),
        )
    }
}

/// [`AuthError`] 종류별 HTTP 상태 코드.
pub fn status_for(err: &AuthError) -> StatusCode {
    match err {
        AuthError::Conflict(_) => StatusCode::CONFLICT,
        AuthError::Unauthorized => StatusCode::UNAUTHORIZED,
        AuthError::Forbidden => StatusCode::FORBIDDEN,
        AuthError::NotFound(_) => StatusCode::NOT_FOUND,
        AuthError::Malformed(_) => StatusCode::BAD_REQUEST,
        AuthError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        let status = status_for(&err);
        let message = match &err {
            // 내부 장애 내용은 로그로만
            AuthError::Unavailable(reason) => {
                error!(reason = %reason, "auth backend unavailable");
                "서비스를 일시적으로 사용할 수 없습니다".to_string()
            }
            other => other.to_string(),
        };
        Self::new(status, ApiErrorResponse::new(err.code(), message))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(self.body)).into_response();
        if self.status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

/// API 핸들러 Result 타입 별칭.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_response_new() {
        let error = ApiErrorResponse::new("TEST_ERROR", "Test message");
        assert_eq!(error.code, "TEST_ERROR");
        assert_eq!(error.message, "Test message");
        assert!(error.timestamp > 0);
        assert!(error.details.is_none());
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AuthError::Conflict("alice".into()), StatusCode::CONFLICT),
            (AuthError::Unauthorized, StatusCode::UNAUTHORIZED),
            (AuthError::Forbidden, StatusCode::FORBIDDEN),
            (AuthError::NotFound("bob".into()), StatusCode::NOT_FOUND),
            (AuthError::Malformed("x".into()), StatusCode::BAD_REQUEST),
            (AuthError::Unavailable("db".into()), StatusCode::SERVICE_UNAVAILABLE),
        ];
        for (err, expected) in cases {
            assert_eq!(status_for(&err), expected);
        }
    }

    #[test]
    fn test_unavailable_hides_reason() {
        let api: ApiError = AuthError::Unavailable("pool timed out at 10.0.0.3".into()).into();
        assert_eq!(api.body.code, "SERVICE_UNAVAILABLE");
        assert!(!api.body.message.contains("10.0.0.3"));
    }

    #[test]
    fn test_unauthorized_sets_challenge_header() {
        let response = ApiError::from(AuthError::Unauthorized).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(WWW_AUTHENTICATE).unwrap(),
            "Bearer"
        );
    }

    #[test]
    fn test_json_serialization_skips_empty_details() {
        let error = ApiErrorResponse::new("NOT_FOUND", "Resource not found");
        let json = serde_json::to_string(&error).unwrap();

        assert!(!json.contains("details"));
        assert!(json.contains(r#""code":"NOT_FOUND""#));
        assert!(json.contains(r#""message":"Resource not found""#));
    }
}
