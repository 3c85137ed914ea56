//! # Auth API
//!
//! 인증 코어를 HTTP로 노출하는 Axum 서버 라이브러리.
//!
//! 주요 구성:
//! - `/api/auth/*` 인증 엔드포인트
//! - `/health`, `/health/ready` 헬스 체크
//! - `/metrics` Prometheus 메트릭

pub mod error;
pub mod extract;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiErrorResponse, ApiResult};
pub use routes::create_router;
pub use state::{AppState, StoreKind};
