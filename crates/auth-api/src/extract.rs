//! 요청 추출기.
//!
//! - [`BearerAuth`]: `Authorization: Bearer <token>` 헤더의 Access Token 검증
//! - [`ValidatedJson`]: JSON 본문 역직렬화 후 `validator` 규칙 검사

use std::sync::Arc;

use axum::{
    extract::{FromRequest, FromRequestParts, Request},
    http::{header::AUTHORIZATION, request::Parts},
    Json,
};
use serde::de::DeserializeOwned;
use validator::Validate;

use auth_core::{AccessClaims, AuthError};

use crate::error::ApiError;
use crate::state::AppState;

/// 인증된 요청의 클레임.
///
/// ```rust,ignore
/// async fn me(BearerAuth(claims): BearerAuth) -> Json<MeResponse> { ... }
/// ```
#[derive(Debug, Clone)]
pub struct BearerAuth(pub AccessClaims);

/// `Authorization` 헤더에서 Bearer 토큰을 꺼냅니다.
fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

impl FromRequestParts<Arc<AppState>> for BearerAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(AuthError::Unauthorized)?;
        let claims = state.auth.verify_access_token(token)?;
        Ok(BearerAuth(claims))
    }
}

/// 검증된 JSON 본문.
///
/// 파싱 실패와 검증 실패 모두 `400 MALFORMED`입니다.
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::malformed(rejection.body_text()))?;

        value.validate().map_err(|errors| {
            ApiError::malformed_with_details(
                "요청 검증 실패",
                serde_json::to_value(&errors).unwrap_or_default(),
            )
        })?;

        Ok(ValidatedJson(value))
    }
}
