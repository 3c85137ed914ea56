//! Prometheus 메트릭 설정 및 유틸리티.
//!
//! HTTP 요청 메트릭과 인증 이벤트 메트릭을 수집하고 `/metrics` 엔드포인트로 노출합니다.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

use auth_core::AuthResult;

/// Prometheus 메트릭 레코더를 설정하고 핸들을 반환합니다.
///
/// 레코더가 이미 설치되어 있으면 에러를 반환합니다.
pub fn setup_metrics_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("http_request_duration_seconds".to_string()),
            &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0],
        )?
        .install_recorder()
}

// ============================================================================
// HTTP 메트릭 헬퍼 함수
// ============================================================================

/// HTTP 요청 카운터 증가.
pub fn record_http_request(method: &str, path: &str) {
    counter!("http_requests_total", "method" => method.to_string(), "path" => path.to_string())
        .increment(1);
}

/// HTTP 응답 카운터 증가.
pub fn record_http_response(method: &str, path: &str, status: u16) {
    counter!(
        "http_responses_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// HTTP 요청 지속 시간 기록.
pub fn record_http_duration(method: &str, path: &str, duration_secs: f64) {
    histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .record(duration_secs);
}

// ============================================================================
// 인증 이벤트 메트릭
// ============================================================================

/// 인증 작업 결과 라벨. 성공은 `success`, 실패는 에러 코드 소문자.
pub fn outcome_label<T>(result: &AuthResult<T>) -> String {
    match result {
        Ok(_) => "success".to_string(),
        Err(e) => e.code().to_ascii_lowercase(),
    }
}

/// 인증 이벤트 카운터 증가.
pub fn record_auth_event(operation: &'static str, outcome: String) {
    counter!("auth_events_total", "operation" => operation, "outcome" => outcome).increment(1);
}

/// 작업 결과를 기록하고 그대로 돌려줍니다.
pub fn observe<T>(operation: &'static str, result: AuthResult<T>) -> AuthResult<T> {
    record_auth_event(operation, outcome_label(&result));
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use auth_core::AuthError;

    #[test]
    fn test_outcome_label() {
        assert_eq!(outcome_label(&Ok::<(), AuthError>(())), "success");
        assert_eq!(
            outcome_label(&Err::<(), _>(AuthError::Unauthorized)),
            "unauthorized"
        );
        assert_eq!(
            outcome_label(&Err::<(), _>(AuthError::Unavailable("db".into()))),
            "service_unavailable"
        );
    }

    #[test]
    fn test_observe_passes_result_through() {
        // 레코더가 없으면 기록은 무시됨
        let result = observe("login", Err::<(), _>(AuthError::Forbidden));
        assert!(matches!(result, Err(AuthError::Forbidden)));
    }
}
