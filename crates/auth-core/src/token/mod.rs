//! 토큰 발급 및 검증.
//!
//! - Access Token: HS256 JWT, 저장하지 않고 서명으로만 검증
//! - Refresh Token: 불투명 난수 문자열, 저장소 조회로만 해석

mod claims;
mod issuer;

pub use claims::AccessClaims;
pub use issuer::{
    fingerprint_refresh_token, AccessTokenVerifier, MintedAccessToken, MintedRefreshToken,
    TokenError, TokenIssuer, TokenRejection, REFRESH_TOKEN_BYTES,
};
