//! 설정 관리.
//!
//! 기본값 → 설정 파일(선택) → 환경 변수(`AUTH__SECTION__KEY`) 순으로 덮어씁니다.
//! `JWT_SECRET`, `DATABASE_URL`은 편의를 위해 별도로 인식합니다.

use std::path::Path;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};
use thiserror::Error;

use crate::logging::{LogConfig, LogFormat};
use crate::policy::PolicyDefinition;

/// 서명 키 최소 길이 (바이트).
pub const MIN_SIGNING_SECRET_LEN: usize = 32;

/// 설정 에러.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 설정 소스 로드/역직렬화 실패
    #[error("설정 로드 실패: {0}")]
    Load(#[from] config::ConfigError),

    /// 값이 유효하지 않음
    #[error("유효하지 않은 설정: {0}")]
    Invalid(String),
}

/// 애플리케이션 설정.
#[derive(Debug, Deserialize)]
pub struct AuthConfig {
    /// 서버 설정
    #[serde(default)]
    pub server: ServerConfig,
    /// 데이터베이스 설정
    #[serde(default)]
    pub database: DatabaseConfig,
    /// 로깅 설정
    #[serde(default)]
    pub logging: LoggingConfig,
    /// 토큰 발급 설정
    pub token: TokenConfig,
    /// 비밀번호 해싱 비용
    #[serde(default)]
    pub password: PasswordConfig,
    /// 보안 정책
    #[serde(default)]
    pub security: SecurityConfig,
    /// 추가 역할 정책
    #[serde(default)]
    pub policies: Vec<PolicyDefinition>,
}

/// 서버 설정.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 바인딩할 호스트
    pub host: String,
    /// 리스닝할 포트
    pub port: u16,
    /// 요청 타임아웃 (초)
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            request_timeout_secs: 30,
        }
    }
}

/// 데이터베이스 설정.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// 연결 URL (없으면 인메모리 저장소 사용)
    pub url: Option<String>,
    /// 최대 연결 수
    pub max_connections: u32,
    /// 연결 타임아웃 (초)
    pub connection_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            connection_timeout_secs: 10,
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl LoggingConfig {
    /// 로깅 초기화용 설정으로 변환. 알 수 없는 형식은 pretty로 처리합니다.
    pub fn to_log_config(&self) -> LogConfig {
        let format = self.format.parse().unwrap_or(LogFormat::Pretty);
        LogConfig::new(self.level.clone()).with_format(format)
    }
}

/// 토큰 발급 설정.
#[derive(Debug, Deserialize)]
pub struct TokenConfig {
    /// HS256 서명 키
    #[serde(deserialize_with = "deserialize_secret")]
    pub signing_secret: SecretString,
    /// `iss` 클레임 (설정 시 검증)
    #[serde(default)]
    pub issuer: Option<String>,
    /// `aud` 클레임 (설정 시 검증)
    #[serde(default)]
    pub audience: Option<String>,
    /// Access Token 유효 시간 (분)
    #[serde(default = "default_access_ttl_minutes")]
    pub access_ttl_minutes: i64,
    /// Refresh Token 유효 기간 (일)
    #[serde(default = "default_refresh_ttl_days")]
    pub refresh_ttl_days: i64,
}

fn default_access_ttl_minutes() -> i64 {
    60
}
fn default_refresh_ttl_days() -> i64 {
    7
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(|s| SecretString::new(s.into_boxed_str()))
}

impl TokenConfig {
    /// 기본 TTL로 토큰 설정 생성.
    pub fn new(signing_secret: impl Into<String>) -> Self {
        Self {
            signing_secret: SecretString::new(signing_secret.into().into_boxed_str()),
            issuer: None,
            audience: None,
            access_ttl_minutes: default_access_ttl_minutes(),
            refresh_ttl_days: default_refresh_ttl_days(),
        }
    }

    /// `iss` 클레임을 설정합니다.
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// `aud` 클레임을 설정합니다.
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    /// 값 검증.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.signing_secret.expose_secret().len() < MIN_SIGNING_SECRET_LEN {
            return Err(ConfigError::Invalid(format!(
                "token.signing_secret은 최소 {}바이트여야 합니다",
                MIN_SIGNING_SECRET_LEN
            )));
        }
        if self.access_ttl_minutes <= 0 {
            return Err(ConfigError::Invalid(
                "token.access_ttl_minutes는 양수여야 합니다".to_string(),
            ));
        }
        if self.refresh_ttl_days <= 0 {
            return Err(ConfigError::Invalid(
                "token.refresh_ttl_days는 양수여야 합니다".to_string(),
            ));
        }
        Ok(())
    }
}

/// Argon2id 비용 파라미터.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct PasswordConfig {
    /// 메모리 비용 (KiB)
    pub memory_kib: u32,
    /// 반복 횟수
    pub iterations: u32,
    /// 병렬도
    pub parallelism: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        // argon2 크레이트 기본값과 동일
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl PasswordConfig {
    /// 테스트용 저비용 파라미터.
    pub fn insecure_fast() -> Self {
        Self {
            memory_kib: 256,
            iterations: 1,
            parallelism: 1,
        }
    }
}

/// 보안 정책 설정.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// 리프레시 토큰 재사용 탐지 시 해당 사용자의 모든 토큰 폐기
    pub revoke_all_on_replay: bool,
    /// 만료 토큰 정리 주기 (초)
    pub purge_interval_secs: u64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            revoke_all_on_replay: true,
            purge_interval_secs: 3600,
        }
    }
}

impl AuthConfig {
    /// 파일(선택)과 환경 변수에서 설정을 로드합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::from(path.as_ref()).required(false))
            .add_source(
                config::Environment::with_prefix("AUTH")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("token.signing_secret", std::env::var("JWT_SECRET").ok())?
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?;

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load("config/default.toml")
    }

    /// 주어진 토큰 설정과 나머지 기본값으로 설정 생성.
    pub fn with_token(token: TokenConfig) -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            token,
            password: PasswordConfig::default(),
            security: SecurityConfig::default(),
            policies: Vec::new(),
        }
    }

    /// 전체 설정 검증.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.token.validate()?;
        if self.password.parallelism == 0 || self.password.iterations == 0 {
            return Err(ConfigError::Invalid(
                "password.iterations와 password.parallelism은 1 이상이어야 합니다".to_string(),
            ));
        }
        for policy in &self.policies {
            policy.validate().map_err(ConfigError::Invalid)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-for-jwt-testing-minimum-32-chars";

    #[test]
    fn test_token_config_defaults() {
        let token = TokenConfig::new(SECRET);
        assert_eq!(token.access_ttl_minutes, 60);
        assert_eq!(token.refresh_ttl_days, 7);
        assert!(token.validate().is_ok());
    }

    #[test]
    fn test_short_secret_rejected() {
        let token = TokenConfig::new("too-short");
        assert!(matches!(token.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_secret_is_redacted_in_debug() {
        let token = TokenConfig::new(SECRET);
        let debug = format!("{:?}", token);
        assert!(!debug.contains(SECRET));
    }

    #[test]
    fn test_deserialize_from_toml_source() {
        let toml = r#"
            [token]
            signing_secret = "test-secret-key-for-jwt-testing-minimum-32-chars"
            issuer = "auth.local"
            access_ttl_minutes = 15

            [security]
            revoke_all_on_replay = false

            [[policies]]
            name = "Auditors"
            any_of = ["Auditor", "Admin"]
        "#;

        let config: AuthConfig = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert!(config.validate().is_ok());
        assert_eq!(config.token.issuer.as_deref(), Some("auth.local"));
        assert_eq!(config.token.access_ttl_minutes, 15);
        assert_eq!(config.token.refresh_ttl_days, 7);
        assert!(!config.security.revoke_all_on_replay);
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.policies.len(), 1);
        assert_eq!(config.policies[0].name, "Auditors");
    }

    #[test]
    fn test_logging_config_conversion() {
        let logging = LoggingConfig {
            level: "debug".to_string(),
            format: "json".to_string(),
        };
        let log_config = logging.to_log_config();
        assert_eq!(log_config.level, "debug");
        assert_eq!(log_config.format, LogFormat::Json);
    }
}
