//! 인증 도메인 모델.

pub mod refresh_token;
pub mod user;

pub use refresh_token::{RefreshTokenRecord, TokenState};
pub use user::{RoleSet, User, ROLE_ADMIN, ROLE_USER};
