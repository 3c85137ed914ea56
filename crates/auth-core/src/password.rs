//! 비밀번호 해싱.
//!
//! Argon2id 기반 단방향 해시. 저장 형식은 알고리즘/파라미터/솔트/다이제스트를
//! 모두 담은 PHC 문자열이므로 파라미터가 바뀌어도 기존 해시를 검증할 수 있습니다.

use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString,
    },
    Algorithm, Argon2, Params, Version,
};
use tracing::warn;

use crate::config::PasswordConfig;

/// 비밀번호 처리 에러.
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("비밀번호 해싱 실패")]
    HashingFailed,
    #[error("잘못된 Argon2 파라미터: {0}")]
    InvalidParams(String),
}

/// 비밀번호 검증 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordVerification {
    Success,
    Failed,
}

impl PasswordVerification {
    pub fn is_success(&self) -> bool {
        matches!(self, PasswordVerification::Success)
    }
}

/// Argon2id 비밀번호 해셔.
///
/// 복제 비용이 낮으므로 `spawn_blocking`에 넘길 때 복제해서 사용합니다.
#[derive(Clone)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
}

impl std::fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let params = self.argon2.params();
        f.debug_struct("PasswordHasher")
            .field("m_cost", &params.m_cost())
            .field("t_cost", &params.t_cost())
            .field("p_cost", &params.p_cost())
            .finish()
    }
}

impl PasswordHasher {
    /// 설정된 비용으로 해셔 생성.
    pub fn new(config: &PasswordConfig) -> Result<Self, PasswordError> {
        let params = Params::new(config.memory_kib, config.iterations, config.parallelism, None)
            .map_err(|e| PasswordError::InvalidParams(e.to_string()))?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    /// 비밀번호 해싱.
    ///
    /// 매 호출마다 새 솔트를 생성하므로 같은 비밀번호도 다른 해시가 됩니다.
    ///
    /// ```rust,ignore
    /// let hash = hasher.hash("my_secure_password")?;
    /// // "$argon2id$v=19$m=19456,t=2,p=1$..."
    /// ```
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);

        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|_| PasswordError::HashingFailed)?;

        Ok(hash.to_string())
    }

    /// 비밀번호 검증.
    ///
    /// 다이제스트 비교는 상수 시간입니다. 저장된 해시 형식이 잘못된 경우에도
    /// 에러 대신 `Failed`를 돌려주어 호출자가 구분할 수 없게 합니다.
    pub fn verify(&self, password: &str, hash: &str) -> PasswordVerification {
        let parsed = match PasswordHash::new(hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "Stored password hash is not a valid PHC string");
                return PasswordVerification::Failed;
            }
        };

        match self.argon2.verify_password(password.as_bytes(), &parsed) {
            Ok(()) => PasswordVerification::Success,
            Err(_) => PasswordVerification::Failed,
        }
    }
}
