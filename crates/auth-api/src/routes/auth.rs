//! 인증 endpoint.
//!
//! JSON 본문은 camelCase를 사용합니다.
//!
//! | 경로 | 인증 | 성공 |
//! |------|------|------|
//! | POST /register | 없음 | 200 |
//! | POST /login | 없음 | 200 |
//! | POST /refresh | 없음 | 200 |
//! | POST /assign-role | Bearer, AdminOnly | 200 |
//! | POST /revoke-role | Bearer, AdminOnly | 200 |
//! | POST /logout | 없음 | 204 |
//! | POST /change-password | Bearer | 204 |
//! | GET /me | Bearer | 200 |

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use auth_core::TokenPair;

use crate::error::ApiResult;
use crate::extract::{BearerAuth, ValidatedJson};
use crate::metrics::observe;
use crate::state::AppState;

// ============================================================================
// 요청/응답 타입
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 64, message = "username은 1-64자여야 합니다"))]
    pub username: String,
    #[validate(email(message = "올바른 이메일 형식이 아닙니다"))]
    pub email: String,
    #[validate(length(min = 1, max = 256, message = "password는 1-256자여야 합니다"))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub id: Uuid,
    pub username: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 64))]
    pub username: String,
    #[validate(length(min = 1, max = 256))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    #[validate(length(min = 1, max = 512, message = "refreshToken이 필요합니다"))]
    pub refresh_token: String,
}

/// 로그인/갱신 응답.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access Token 유효 시간 (초)
    pub expires_in: i64,
}

impl From<TokenPair> for TokenResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: pair.token_type.to_string(),
            expires_in: pair.expires_in,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct RoleChangeRequest {
    #[validate(length(min = 1, max = 64))]
    pub username: String,
    #[validate(length(min = 1, max = 64, message = "role은 1-64자여야 합니다"))]
    pub role: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RoleChangeResponse {
    pub username: String,
    pub role: String,
    /// 실제로 변경되었는지 (멱등 호출이면 false)
    pub changed: bool,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, max = 256))]
    pub current_password: String,
    #[validate(length(min = 1, max = 256, message = "newPassword는 1-256자여야 합니다"))]
    pub new_password: String,
}

/// 현재 토큰의 클레임.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub user_id: Uuid,
    pub username: String,
    pub roles: Vec<String>,
    pub issued_at: i64,
    pub expires_at: i64,
}

// ============================================================================
// 핸들러
// ============================================================================

/// POST /api/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> ApiResult<Json<RegisterResponse>> {
    let registered = observe(
        "register",
        state
            .auth
            .register(&req.username, &req.email, &req.password)
            .await,
    )?;

    Ok(Json(RegisterResponse {
        id: registered.id,
        username: registered.username,
    }))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let pair = observe("login", state.auth.login(&req.username, &req.password).await)?;
    Ok(Json(pair.into()))
}

/// POST /api/auth/refresh
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<RefreshTokenRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let pair = observe("refresh", state.auth.refresh(&req.refresh_token).await)?;
    Ok(Json(pair.into()))
}

/// POST /api/auth/assign-role
pub async fn assign_role(
    State(state): State<Arc<AppState>>,
    BearerAuth(actor): BearerAuth,
    ValidatedJson(req): ValidatedJson<RoleChangeRequest>,
) -> ApiResult<Json<RoleChangeResponse>> {
    let changed = observe(
        "assign_role",
        state.auth.assign_role(&actor, &req.username, &req.role).await,
    )?;

    Ok(Json(RoleChangeResponse {
        username: req.username,
        role: req.role,
        changed,
    }))
}

/// POST /api/auth/revoke-role
pub async fn revoke_role(
    State(state): State<Arc<AppState>>,
    BearerAuth(actor): BearerAuth,
    ValidatedJson(req): ValidatedJson<RoleChangeRequest>,
) -> ApiResult<Json<RoleChangeResponse>> {
    let changed = observe(
        "revoke_role",
        state.auth.revoke_role(&actor, &req.username, &req.role).await,
    )?;

    Ok(Json(RoleChangeResponse {
        username: req.username,
        role: req.role,
        changed,
    }))
}

/// POST /api/auth/logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<RefreshTokenRequest>,
) -> ApiResult<StatusCode> {
    observe("logout", state.auth.logout(&req.refresh_token).await)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/auth/change-password
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    BearerAuth(actor): BearerAuth,
    ValidatedJson(req): ValidatedJson<ChangePasswordRequest>,
) -> ApiResult<StatusCode> {
    observe(
        "change_password",
        state
            .auth
            .change_password(&actor, &req.current_password, &req.new_password)
            .await,
    )?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/auth/me
pub async fn me(BearerAuth(claims): BearerAuth) -> Json<MeResponse> {
    Json(MeResponse {
        user_id: claims.uid,
        username: claims.sub,
        roles: claims.roles,
        issued_at: claims.iat,
        expires_at: claims.exp,
    })
}

/// 인증 라우터 생성.
pub fn auth_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/assign-role", post(assign_role))
        .route("/revoke-role", post(revoke_role))
        .route("/logout", post(logout))
        .route("/change-password", post(change_password))
        .route("/me", get(me))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_response_is_camel_case() {
        let response = TokenResponse {
            token: "a.b.c".to_string(),
            refresh_token: "opaque".to_string(),
            token_type: "Bearer".to_string(),
            expires_in: 3600,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["refreshToken"], "opaque");
        assert_eq!(json["tokenType"], "Bearer");
        assert_eq!(json["expiresIn"], 3600);
    }

    #[test]
    fn test_register_request_validation() {
        let valid = RegisterRequest {
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password: "p@ss".to_string(),
        };
        assert!(valid.validate().is_ok());

        let empty_name = RegisterRequest {
            username: String::new(),
            ..valid
        };
        assert!(empty_name.validate().is_err());
    }

    #[test]
    fn test_refresh_request_field_name() {
        let req: RefreshTokenRequest =
            serde_json::from_str(r#"{"refreshToken":"abc"}"#).unwrap();
        assert_eq!(req.refresh_token, "abc");

        assert!(serde_json::from_str::<RefreshTokenRequest>(r#"{"refresh_token":"abc"}"#).is_err());
    }
}
