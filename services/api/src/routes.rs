use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use serde_json::json;
use std::sync::Arc;

use call_qc::workflows::quality::{quality_router, QualityRepository, QualityService};

/// The library router plus the operational endpoints every deployment of
/// this service carries.
pub(crate) fn with_quality_routes<R>(service: Arc<QualityService<R>>) -> axum::Router
where
    R: QualityRepository + 'static,
{
    quality_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::InMemoryQualityRepository;
    use axum::body::Body;
    use axum::http::Request;
    use call_qc::workflows::quality::{DisabledScriptModel, ScriptEvaluator};
    use tower::ServiceExt;

    fn test_router() -> axum::Router {
        let service = Arc::new(QualityService::new(
            Arc::new(InMemoryQualityRepository::seeded()),
            ScriptEvaluator::new(Box::new(DisabledScriptModel)),
        ));
        with_quality_routes(service)
    }

    #[tokio::test]
    async fn healthcheck_reports_ok() {
        let response = test_router()
            .oneshot(
                Request::get("/health")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn violations_endpoint_serves_seeded_findings() {
        let response = test_router()
            .oneshot(
                Request::get(
                    "/api/v1/quality/violations?start=2025-06-01T00:00:00Z&end=2025-06-30T00:00:00Z",
                )
                .body(Body::empty())
                .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .expect("read body");
        let payload: serde_json::Value = serde_json::from_slice(&body).expect("json payload");
        let findings = payload.as_array().expect("array payload");
        assert!(!findings.is_empty());
    }

    #[tokio::test]
    async fn evaluate_endpoint_returns_score_view() {
        let response = test_router()
            .oneshot(
                Request::post("/api/v1/quality/orders/101/evaluate")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .expect("read body");
        let payload: serde_json::Value = serde_json::from_slice(&body).expect("json payload");
        assert_eq!(payload["order_id"], 101);
        assert!(payload["deal_score_pct"].is_number());
    }
}
