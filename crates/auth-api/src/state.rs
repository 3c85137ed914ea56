//! 모든 핸들러에서 공유되는 애플리케이션 상태.
//!
//! AppState는 Arc로 래핑되어 여러 요청 간에 공유됩니다.

use std::sync::Arc;

use auth_core::{AuthConfig, AuthService, ConfigError, CredentialStore, MemoryCredentialStore};

/// 자격증명 저장소 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// 프로세스 메모리 (재시작 시 소실)
    Memory,
    /// PostgreSQL
    Postgres,
}

impl StoreKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKind::Memory => "memory",
            StoreKind::Postgres => "postgres",
        }
    }
}

/// 애플리케이션 공유 상태.
pub struct AppState {
    /// 인증 서비스
    pub auth: Arc<AuthService>,

    /// 사용 중인 저장소 종류
    pub store_kind: StoreKind,

    /// 서버 시작 시간 (업타임 계산용)
    pub started_at: chrono::DateTime<chrono::Utc>,

    /// API 버전
    pub version: String,
}

impl AppState {
    /// 인증 서비스로 상태 생성.
    pub fn new(auth: Arc<AuthService>, store_kind: StoreKind) -> Self {
        Self {
            auth,
            store_kind,
            started_at: chrono::Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// 설정과 저장소로 서비스까지 한 번에 생성.
    pub fn from_config(
        config: &AuthConfig,
        store: Arc<dyn CredentialStore>,
        store_kind: StoreKind,
    ) -> Result<Self, ConfigError> {
        let auth = AuthService::new(config, store)?;
        Ok(Self::new(Arc::new(auth), store_kind))
    }

    /// 인메모리 저장소를 쓰는 상태.
    pub fn in_memory(config: &AuthConfig) -> Result<Self, ConfigError> {
        Self::from_config(
            config,
            Arc::new(MemoryCredentialStore::new()),
            StoreKind::Memory,
        )
    }

    /// 서버 업타임(초).
    pub fn uptime_secs(&self) -> i64 {
        (chrono::Utc::now() - self.started_at).num_seconds()
    }

    /// 저장소 상태 확인.
    pub async fn is_store_healthy(&self) -> bool {
        self.auth.ping().await.is_ok()
    }
}
