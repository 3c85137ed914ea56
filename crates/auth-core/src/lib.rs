//! # Auth Core
//!
//! 자격증명 검증, 토큰 수명 관리, 역할 기반 권한 판단을 제공합니다.
//!
//! 이 크레이트는 HTTP 계층과 무관한 인증 코어입니다:
//! - Argon2id 비밀번호 해싱
//! - HS256 Access Token 발급/검증
//! - 회전형 불투명 Refresh Token 상태 머신
//! - 이름 붙은 역할 정책 평가
//! - 교체 가능한 자격증명 저장소 (인메모리, PostgreSQL)
//! - 설정 관리 및 로깅 인프라

pub mod clock;
pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod password;
pub mod policy;
pub mod refresh;
pub mod service;
pub mod store;
pub mod token;

pub use clock::{Clock, ManualClock, SystemClock};
pub use crate::config::*;
pub use domain::*;
pub use error::*;
pub use logging::{init_logging, LogConfig, LogFormat, LoggingError};
pub use password::{PasswordError, PasswordHasher, PasswordVerification};
pub use policy::{PolicyEvaluator, RolePredicate, ADMIN_ONLY, USER_OR_ADMIN};
pub use refresh::{IssuedRefreshToken, RefreshError, RefreshTokenManager};
pub use service::{AuthService, RegisteredUser, TokenPair, TOKEN_TYPE_BEARER};
pub use store::{CredentialStore, MemoryCredentialStore, RotateOutcome, SuccessorToken};
#[cfg(feature = "postgres")]
pub use store::PgCredentialStore;
pub use token::{AccessClaims, AccessTokenVerifier, TokenIssuer, TokenRejection};
