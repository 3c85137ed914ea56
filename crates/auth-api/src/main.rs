//! 인증 API 서버.
//!
//! 설정을 읽어 자격증명 저장소와 인증 서비스를 구성하고 Axum 서버를 시작합니다.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{error, info, warn};

use auth_api::metrics::setup_metrics_recorder;
use auth_api::{create_router, AppState, StoreKind};
use auth_core::{init_logging, AuthConfig, AuthService, CredentialStore, MemoryCredentialStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env 파일 로드 (없어도 무시)
    dotenvy::dotenv().ok();

    let config = match AuthConfig::load_default() {
        Ok(config) => config,
        Err(e) => {
            // 로깅 초기화 전이므로 stderr로 출력
            eprintln!("설정 로드 실패: {}", e);
            return Err(e.into());
        }
    };

    init_logging(config.logging.to_log_config()).context("로깅 초기화 실패")?;
    info!("Starting auth API server...");

    let metrics_handle = setup_metrics_recorder().context("Prometheus 레코더 설치 실패")?;

    let (store, store_kind) = create_store(&config).await?;
    let auth = AuthService::new(&config, store).map_err(|e| {
        error!(error = %e, "AuthService 초기화 실패");
        e
    })?;
    let state = Arc::new(AppState::new(Arc::new(auth), store_kind));

    info!(
        version = %state.version,
        store = store_kind.as_str(),
        "Application state initialized"
    );

    let shutdown_token = CancellationToken::new();
    let purge_handle = spawn_purge_task(
        state.clone(),
        Duration::from_secs(config.security.purge_interval_secs),
        shutdown_token.clone(),
    );

    let app = create_router(
        state,
        Some(metrics_handle),
        Duration::from_secs(config.server.request_timeout_secs),
    )
    .layer(cors_layer());

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("잘못된 서버 주소")?;
    info!(%addr, "Auth API server listening");
    info!("Metrics available at http://{}/metrics", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_token.clone()))
        .await?;

    info!("Server shutdown initiated, cleaning up...");
    shutdown_token.cancel();

    if tokio::time::timeout(Duration::from_secs(10), purge_handle)
        .await
        .is_err()
    {
        warn!("Cleanup timeout, forcing shutdown");
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// 설정에 따라 자격증명 저장소 생성.
///
/// `database.url`이 있고 `postgres` feature로 빌드된 경우에만 PostgreSQL을 사용합니다.
async fn create_store(
    config: &AuthConfig,
) -> anyhow::Result<(Arc<dyn CredentialStore>, StoreKind)> {
    #[cfg(feature = "postgres")]
    {
        if let Some(url) = config.database.url.as_deref() {
            let store = auth_core::PgCredentialStore::connect(url, &config.database)
                .await
                .context("PostgreSQL 연결 실패")?;
            store.migrate().await.context("마이그레이션 실패")?;
            info!("Using PostgreSQL credential store");
            return Ok((Arc::new(store), StoreKind::Postgres));
        }
    }

    if config.database.url.is_some() {
        warn!("database.url is set but the server was built without the postgres feature");
    }
    warn!("Using in-memory credential store; all users and sessions are lost on restart");
    Ok((Arc::new(MemoryCredentialStore::new()), StoreKind::Memory))
}

/// 만료된 리프레시 토큰을 주기적으로 정리하는 백그라운드 태스크.
fn spawn_purge_task(
    state: Arc<AppState>,
    interval: Duration,
    shutdown_token: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval.max(Duration::from_secs(1)));
        // 첫 tick은 즉시 발생
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown_token.cancelled() => {
                    info!("Refresh token purge task stopped");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = state.auth.purge_expired_refresh_tokens().await {
                        warn!(error = %e, "Refresh token purge failed");
                    }
                }
            }
        }
    })
}

/// CORS 레이어 설정.
///
/// `CORS_ORIGINS`(쉼표 구분)가 없으면 모든 origin을 허용합니다.
fn cors_layer() -> CorsLayer {
    let allow_origin = match std::env::var("CORS_ORIGINS") {
        Ok(origins) if !origins.is_empty() => {
            let origins: Vec<_> = origins
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();

            if origins.is_empty() {
                warn!("CORS_ORIGINS is set but contains no valid origins, allowing any");
                AllowOrigin::any()
            } else {
                info!("CORS configured with {} allowed origins", origins.len());
                AllowOrigin::list(origins)
            }
        }
        _ => {
            warn!("CORS_ORIGINS not set, allowing any origin (development mode)");
            AllowOrigin::any()
        }
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
        ])
}

/// Graceful shutdown 시그널 대기.
///
/// Ctrl+C 또는 SIGTERM을 받으면 종료 토큰을 취소합니다.
async fn shutdown_signal(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
    }

    shutdown_token.cancel();
    info!("Shutdown signal propagated to background tasks");
}
