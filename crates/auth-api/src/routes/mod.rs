//! API 라우트.

pub mod auth;
pub mod health;

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, http::StatusCode, middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub use auth::auth_router;
pub use health::health_router;

use crate::middleware::metrics_layer;
use crate::state::AppState;

/// 상태가 아직 주입되지 않은 API 라우터.
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .merge(health_router())
        .nest("/api/auth", auth_router())
}

/// Prometheus 메트릭 렌더링 핸들러.
async fn metrics_handler(State(handle): State<PrometheusHandle>) -> String {
    handle.render()
}

/// 전체 라우터 생성.
///
/// 메트릭 핸들이 없으면 `/metrics`는 등록하지 않습니다.
pub fn create_router(
    state: Arc<AppState>,
    metrics_handle: Option<PrometheusHandle>,
    request_timeout: Duration,
) -> Router {
    let mut router = create_api_router().with_state(state);

    if let Some(handle) = metrics_handle {
        let metrics_router = Router::new()
            .route("/metrics", get(metrics_handler))
            .with_state(handle);
        router = router.merge(metrics_router);
    }

    router
        .layer(middleware::from_fn(metrics_layer))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
}
