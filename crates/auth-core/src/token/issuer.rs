//! Access/Refresh Token 발급 및 Access Token 검증.
//!
//! 발급자는 읽기 전용 키만 보관하는 순수 함수 집합입니다.
//! (클레임, 키, 시각) → 서명된 토큰.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use rand::{rngs::OsRng, RngCore};
use secrecy::ExposeSecret;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::AccessClaims;
use crate::config::{ConfigError, TokenConfig};
use crate::domain::RoleSet;

/// Refresh Token 원본 값의 엔트로피 (바이트).
pub const REFRESH_TOKEN_BYTES: usize = 32;

/// 서명 알고리즘 (고정).
const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

/// 토큰 발급 에러.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("토큰 인코딩 실패: {0}")]
    Encoding(#[from] jsonwebtoken::errors::Error),
}

/// Access Token 거부 사유.
///
/// 내부 로깅용이며 외부 호출자에게는 일반적인 인증 실패로만 전달됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenRejection {
    #[error("서명이 유효하지 않습니다")]
    BadSignature,
    #[error("토큰이 만료되었습니다")]
    Expired,
    #[error("잘못된 토큰 형식")]
    MalformedClaims,
    #[error("발급자/대상이 일치하지 않습니다")]
    IssuerMismatch,
}

impl TokenRejection {
    fn from_kind(kind: &ErrorKind) -> Self {
        match kind {
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                TokenRejection::BadSignature
            }
            ErrorKind::ExpiredSignature => TokenRejection::Expired,
            ErrorKind::InvalidIssuer | ErrorKind::InvalidAudience => {
                TokenRejection::IssuerMismatch
            }
            ErrorKind::MissingRequiredClaim(claim) if claim == "iss" || claim == "aud" => {
                TokenRejection::IssuerMismatch
            }
            _ => TokenRejection::MalformedClaims,
        }
    }
}

/// 발급된 Access Token.
#[derive(Debug, Clone)]
pub struct MintedAccessToken {
    /// 직렬화된 JWT
    pub token: String,
    /// JWT ID
    pub jti: String,
    /// 만료 시각
    pub expires_at: DateTime<Utc>,
}

/// 발급된 Refresh Token.
///
/// `value`는 클라이언트에게 한 번만 전달되며 저장소에는 `token_hash`만 남습니다.
#[derive(Clone)]
pub struct MintedRefreshToken {
    pub value: String,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for MintedRefreshToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MintedRefreshToken")
            .field("value", &"[REDACTED]")
            .field("token_hash", &self.token_hash)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Refresh Token 원본 값의 SHA-256 지문 (hex).
pub fn fingerprint_refresh_token(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}

/// Access Token 검증기.
///
/// 서명 키를 공유하는 협력 서비스에 넘겨주는 유일한 검증 수단입니다.
/// 복제해도 키를 다시 파싱하지 않습니다.
#[derive(Clone)]
pub struct AccessTokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for AccessTokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessTokenVerifier")
            .field("algorithms", &self.validation.algorithms)
            .field("iss", &self.validation.iss)
            .finish_non_exhaustive()
    }
}

impl AccessTokenVerifier {
    fn new(secret: &[u8], issuer: Option<&str>, audience: Option<&str>) -> Self {
        let mut validation = Validation::new(SIGNING_ALGORITHM);
        // 만료는 주입된 시계로 직접 판단
        validation.validate_exp = false;
        validation.leeway = 0;

        // 설정된 발급자/대상은 클레임이 없어도 불일치로 거부
        let mut required = vec!["exp", "sub"];
        if issuer.is_some() {
            required.push("iss");
        }
        if audience.is_some() {
            required.push("aud");
        }
        validation.set_required_spec_claims(&required);

        if let Some(iss) = issuer {
            validation.set_issuer(&[iss]);
        }
        match audience {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }

        Self {
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// 서명, 발급자/대상, 만료(`now < exp`)를 검증하고 클레임을 반환합니다.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<AccessClaims, TokenRejection> {
        let data = decode::<AccessClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| TokenRejection::from_kind(e.kind()))?;

        if data.claims.is_expired_at(now.timestamp()) {
            return Err(TokenRejection::Expired);
        }
        Ok(data.claims)
    }
}

/// 토큰 발급자.
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    header: Header,
    verifier: AccessTokenVerifier,
    issuer: Option<String>,
    audience: Option<String>,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    /// 토큰 설정으로 발급자 생성. 서명 키가 짧으면 실패합니다.
    pub fn new(config: &TokenConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let secret = config.signing_secret.expose_secret().as_bytes();

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            header: Header::new(SIGNING_ALGORITHM),
            verifier: AccessTokenVerifier::new(
                secret,
                config.issuer.as_deref(),
                config.audience.as_deref(),
            ),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            access_ttl: Duration::minutes(config.access_ttl_minutes),
            refresh_ttl: Duration::days(config.refresh_ttl_days),
        })
    }

    /// Access Token 유효 시간.
    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    /// Refresh Token 유효 기간.
    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// 협력 서비스용 검증기.
    pub fn verifier(&self) -> AccessTokenVerifier {
        self.verifier.clone()
    }

    /// Access Token 발급.
    ///
    /// 클레임: `sub`, 새 `jti`, `uid`, 역할 스냅샷, `iat = now`, `exp = now + TTL`.
    pub fn mint_access_token(
        &self,
        subject: &str,
        user_id: Uuid,
        roles: &RoleSet,
        now: DateTime<Utc>,
    ) -> Result<MintedAccessToken, TokenError> {
        let expires_at = now + self.access_ttl;
        let claims = AccessClaims {
            sub: subject.to_string(),
            jti: Uuid::new_v4().to_string(),
            uid: user_id,
            roles: roles.to_vec(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };

        let token = encode(&self.header, &claims, &self.encoding_key)?;
        Ok(MintedAccessToken {
            token,
            jti: claims.jti,
            expires_at,
        })
    }

    /// 불투명 Refresh Token 발급.
    ///
    /// OS 난수 생성기에서 256비트를 뽑아 base64url로 인코딩합니다.
    /// 사용자나 역할 정보는 전혀 담기지 않으며 저장소 조회로만 해석됩니다.
    pub fn mint_refresh_token(&self, now: DateTime<Utc>) -> MintedRefreshToken {
        let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        let value = URL_SAFE_NO_PAD.encode(bytes);
        let token_hash = fingerprint_refresh_token(&value);

        MintedRefreshToken {
            value,
            token_hash,
            expires_at: now + self.refresh_ttl,
        }
    }

    /// Access Token 검증.
    pub fn verify_access_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<AccessClaims, TokenRejection> {
        self.verifier.verify(token, now)
    }
}
