//! 인증 서비스.
//!
//! 저장소, 비밀번호 해셔, 토큰 발급자, 리프레시 토큰 관리자, 정책 평가기를
//! 묶어 외부에 노출되는 작업(가입, 로그인, 토큰 갱신, 역할 관리 등)을 제공합니다.
//!
//! 모든 실패는 [`AuthError`]의 일반적인 종류로만 외부에 전달되며,
//! 세부 사유(만료, 재사용 탐지, 서명 오류 등)는 `tracing` 로그에만 남습니다.

use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::config::{AuthConfig, ConfigError};
use crate::domain::User;
use crate::error::{AuthError, AuthResult};
use crate::password::{PasswordHasher, PasswordVerification};
use crate::policy::{PolicyEvaluator, ADMIN_ONLY};
use crate::refresh::{RefreshError, RefreshTokenManager};
use crate::store::CredentialStore;
use crate::token::{AccessClaims, AccessTokenVerifier, TokenIssuer};

/// 존재하지 않는 사용자 로그인 시 검증할 더미 비밀번호.
const DUMMY_PASSWORD: &str = "timing-equalization-placeholder";

/// 토큰 타입 (Authorization 헤더 스킴).
pub const TOKEN_TYPE_BEARER: &str = "Bearer";

/// 가입 결과.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredUser {
    pub id: Uuid,
    pub username: String,
}

/// 로그인/갱신 시 발급되는 토큰 쌍.
#[derive(Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    /// Access Token 유효 시간 (초)
    pub expires_in: i64,
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// 인증 서비스.
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    hasher: PasswordHasher,
    issuer: Arc<TokenIssuer>,
    refresh: RefreshTokenManager,
    policies: PolicyEvaluator,
    clock: Arc<dyn Clock>,
    dummy_hash: String,
    revoke_all_on_replay: bool,
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("hasher", &self.hasher)
            .field("issuer", &self.issuer)
            .field("revoke_all_on_replay", &self.revoke_all_on_replay)
            .finish_non_exhaustive()
    }
}

impl AuthService {
    /// 설정과 저장소로 서비스 생성. 시스템 시계를 사용합니다.
    ///
    /// 타이밍 균등화용 더미 해시를 여기서 한 번 계산하므로 호출 비용이 있습니다.
    pub fn new(config: &AuthConfig, store: Arc<dyn CredentialStore>) -> Result<Self, ConfigError> {
        Self::with_clock(config, store, Arc::new(SystemClock))
    }

    /// 시계를 주입해 서비스 생성.
    pub fn with_clock(
        config: &AuthConfig,
        store: Arc<dyn CredentialStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let hasher = PasswordHasher::new(&config.password)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        let dummy_hash = hasher
            .hash(DUMMY_PASSWORD)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        let issuer = Arc::new(TokenIssuer::new(&config.token)?);
        let refresh = RefreshTokenManager::new(store.clone(), issuer.clone());

        info!(
            policies = config.policies.len(),
            revoke_all_on_replay = config.security.revoke_all_on_replay,
            "AuthService initialized"
        );

        Ok(Self {
            store,
            hasher,
            issuer,
            refresh,
            policies: PolicyEvaluator::with_definitions(&config.policies),
            clock,
            dummy_hash,
            revoke_all_on_replay: config.security.revoke_all_on_replay,
        })
    }

    /// 협력 서비스용 Access Token 검증기.
    pub fn verifier(&self) -> AccessTokenVerifier {
        self.issuer.verifier()
    }

    /// 저장소 연결 확인 (readiness 체크용).
    pub async fn ping(&self) -> AuthResult<()> {
        Ok(self.store.ping().await?)
    }

    /// 사용자 가입.
    ///
    /// 기본 역할 `User`로 생성되며 토큰은 발급하지 않습니다.
    #[instrument(skip(self, email, password))]
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> AuthResult<RegisteredUser> {
        let username = username.trim();
        if username.is_empty() {
            return Err(AuthError::Malformed("username은 비어 있을 수 없습니다".to_string()));
        }
        if password.is_empty() {
            return Err(AuthError::Malformed("password는 비어 있을 수 없습니다".to_string()));
        }

        // 해싱 비용을 치르기 전에 빠르게 거절. 최종 판정은 저장소 유일성 제약
        if self.store.find_user_by_username(username).await?.is_some() {
            return Err(AuthError::Conflict(username.to_string()));
        }

        let password_hash = self.hash_password(password.to_string()).await?;
        let user = User::new(username, email.trim(), password_hash, self.clock.now());
        self.store.insert_user(&user).await?;

        info!(user_id = %user.id, "user registered");
        Ok(RegisteredUser {
            id: user.id,
            username: user.username,
        })
    }

    /// 로그인.
    ///
    /// 존재하지 않는 사용자와 틀린 비밀번호는 같은 에러, 같은 비용입니다.
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> AuthResult<TokenPair> {
        let user = self.store.find_user_by_username(username.trim()).await?;

        let user = match user {
            Some(user) => {
                let verification = self
                    .verify_password(password.to_string(), user.password_hash.clone())
                    .await?;
                if !verification.is_success() {
                    debug!(user_id = %user.id, "login rejected: wrong password");
                    return Err(AuthError::Unauthorized);
                }
                user
            }
            None => {
                self.verify_password(password.to_string(), self.dummy_hash.clone())
                    .await?;
                debug!("login rejected: unknown user");
                return Err(AuthError::Unauthorized);
            }
        };

        let pair = self.issue_pair(&user).await?;
        info!(user_id = %user.id, "user logged in");
        Ok(pair)
    }

    /// 리프레시 토큰으로 새 토큰 쌍 발급.
    ///
    /// 새 Access Token에는 저장소에서 다시 읽은 현재 역할이 담깁니다.
    #[instrument(skip_all)]
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenPair> {
        let now = self.clock.now();

        let issued = match self.refresh.rotate(refresh_token, now).await {
            Ok(issued) => issued,
            Err(RefreshError::ReplayDetected { user_id, state }) => {
                warn!(
                    user_id = %user_id,
                    state = %state,
                    revoke_all = self.revoke_all_on_replay,
                    "refresh token replay detected"
                );
                if self.revoke_all_on_replay {
                    let revoked = self.refresh.revoke_all(user_id, now).await?;
                    warn!(user_id = %user_id, revoked, "all refresh tokens revoked after replay");
                }
                return Err(AuthError::Unauthorized);
            }
            Err(RefreshError::Store(e)) => {
                error!(error = %e, "refresh token store failure");
                return Err(e.into());
            }
            Err(e) => {
                debug!(reason = %e, "refresh rejected");
                return Err(e.into());
            }
        };

        let user_id = issued.record.user_id;
        let user = match self.store.find_user_by_id(user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                warn!(user_id = %user_id, "refresh token owner missing");
                self.discard_successor(&issued.value, now).await;
                return Err(AuthError::Unauthorized);
            }
            Err(e) => {
                error!(error = %e, "refresh token owner lookup failed");
                self.discard_successor(&issued.value, now).await;
                return Err(e.into());
            }
        };

        let access = match self
            .issuer
            .mint_access_token(&user.username, user.id, &user.roles, now)
        {
            Ok(access) => access,
            Err(e) => {
                error!(error = %e, "access token signing failed");
                self.discard_successor(&issued.value, now).await;
                return Err(AuthError::Unavailable(e.to_string()));
            }
        };

        info!(user_id = %user.id, "token refreshed");
        Ok(TokenPair {
            access_token: access.token,
            refresh_token: issued.value,
            token_type: TOKEN_TYPE_BEARER,
            expires_in: self.issuer.access_ttl().num_seconds(),
        })
    }

    /// 역할 부여 (`AdminOnly`). 이미 있으면 변경 없이 성공합니다.
    ///
    /// 새로 부여되었으면 `true`.
    #[instrument(skip(self, actor), fields(actor = %actor.sub))]
    pub async fn assign_role(
        &self,
        actor: &AccessClaims,
        target_username: &str,
        role: &str,
    ) -> AuthResult<bool> {
        let target = self.admin_target(actor, target_username, role).await?;
        let changed = self.store.add_role(target.id, role).await?;

        info!(target_id = %target.id, role, changed, "role assigned");
        Ok(changed)
    }

    /// 역할 회수 (`AdminOnly`). 이미 발급된 Access Token에는 영향이 없습니다.
    ///
    /// 실제로 회수되었으면 `true`.
    #[instrument(skip(self, actor), fields(actor = %actor.sub))]
    pub async fn revoke_role(
        &self,
        actor: &AccessClaims,
        target_username: &str,
        role: &str,
    ) -> AuthResult<bool> {
        let target = self.admin_target(actor, target_username, role).await?;
        let changed = self.store.remove_role(target.id, role).await?;

        info!(target_id = %target.id, role, changed, "role revoked");
        Ok(changed)
    }

    /// 로그아웃 (리프레시 토큰 명시적 폐기).
    ///
    /// 알 수 없는 토큰도 성공으로 처리합니다.
    #[instrument(skip_all)]
    pub async fn logout(&self, refresh_token: &str) -> AuthResult<()> {
        let revoked = self
            .refresh
            .revoke(refresh_token, self.clock.now())
            .await?;
        debug!(revoked, "logout");
        Ok(())
    }

    /// 비밀번호 변경. 해당 사용자의 모든 리프레시 토큰을 폐기합니다.
    #[instrument(skip(self, actor, current_password, new_password), fields(user_id = %actor.uid))]
    pub async fn change_password(
        &self,
        actor: &AccessClaims,
        current_password: &str,
        new_password: &str,
    ) -> AuthResult<()> {
        if new_password.is_empty() {
            return Err(AuthError::Malformed("newPassword는 비어 있을 수 없습니다".to_string()));
        }

        let user = self
            .store
            .find_user_by_id(actor.uid)
            .await?
            .ok_or(AuthError::Unauthorized)?;

        let verification = self
            .verify_password(current_password.to_string(), user.password_hash.clone())
            .await?;
        if !verification.is_success() {
            debug!("password change rejected: wrong current password");
            return Err(AuthError::Unauthorized);
        }

        let password_hash = self.hash_password(new_password.to_string()).await?;
        let now = self.clock.now();
        self.store
            .update_password_hash(user.id, &password_hash, now)
            .await?;
        let revoked = self.refresh.revoke_all(user.id, now).await?;

        info!(revoked, "password changed");
        Ok(())
    }

    /// Access Token 검증.
    pub fn verify_access_token(&self, token: &str) -> AuthResult<AccessClaims> {
        self.issuer
            .verify_access_token(token, self.clock.now())
            .map_err(|rejection| {
                debug!(reason = %rejection, "access token rejected");
                AuthError::Unauthorized
            })
    }

    /// 정책 확인. 거부되면 [`AuthError::Forbidden`].
    pub fn authorize(&self, claims: &AccessClaims, policy: &str) -> AuthResult<()> {
        if self.policies.permits(&claims.roles, policy) {
            Ok(())
        } else {
            debug!(subject = %claims.sub, policy, "authorization denied");
            Err(AuthError::Forbidden)
        }
    }

    /// 만료된 리프레시 토큰 정리.
    pub async fn purge_expired_refresh_tokens(&self) -> AuthResult<u64> {
        let purged = self.refresh.purge_expired(self.clock.now()).await?;
        if purged > 0 {
            info!(purged, "expired refresh tokens purged");
        }
        Ok(purged)
    }

    /// 호출자에게 전달되지 못한 후속 토큰 폐기.
    async fn discard_successor(&self, value: &str, now: chrono::DateTime<chrono::Utc>) {
        if let Err(e) = self.refresh.revoke(value, now).await {
            warn!(error = %e, "failed to revoke undelivered refresh token");
        }
    }

    async fn admin_target(
        &self,
        actor: &AccessClaims,
        target_username: &str,
        role: &str,
    ) -> AuthResult<User> {
        self.authorize(actor, ADMIN_ONLY)?;
        if role.trim().is_empty() {
            return Err(AuthError::Malformed("role은 비어 있을 수 없습니다".to_string()));
        }
        // 역할 이름은 정확히 일치해야 하므로 공백이 붙은 태그는 저장하지 않음
        if role != role.trim() {
            return Err(AuthError::Malformed(format!(
                "role 앞뒤에 공백이 있습니다: {:?}",
                role
            )));
        }
        self.store
            .find_user_by_username(target_username.trim())
            .await?
            .ok_or_else(|| AuthError::NotFound(target_username.to_string()))
    }

    async fn issue_pair(&self, user: &User) -> AuthResult<TokenPair> {
        let now = self.clock.now();
        let access = self
            .issuer
            .mint_access_token(&user.username, user.id, &user.roles, now)
            .map_err(|e| {
                error!(error = %e, "access token signing failed");
                AuthError::Unavailable(e.to_string())
            })?;
        let refresh = self.refresh.issue(user.id, now).await?;

        Ok(TokenPair {
            access_token: access.token,
            refresh_token: refresh.value,
            token_type: TOKEN_TYPE_BEARER,
            expires_in: self.issuer.access_ttl().num_seconds(),
        })
    }

    async fn hash_password(&self, password: String) -> AuthResult<String> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AuthError::Unavailable(format!("hashing task failed: {}", e)))?
            .map_err(|e| {
                error!(error = %e, "password hashing failed");
                AuthError::Unavailable(e.to_string())
            })
    }

    async fn verify_password(
        &self,
        password: String,
        password_hash: String,
    ) -> AuthResult<PasswordVerification> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &password_hash))
            .await
            .map_err(|e| AuthError::Unavailable(format!("verification task failed: {}", e)))
    }
}
