use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::domain::{ManagerId, OrderId, OrderScore};
use super::evaluator::{BatchRequest, QualityService};
use super::repository::QualityRepository;

/// Router builder exposing the violation scan and evaluation endpoints.
pub fn quality_router<R>(service: Arc<QualityService<R>>) -> Router
where
    R: QualityRepository + 'static,
{
    Router::new()
        .route("/api/v1/quality/violations", get(violations_handler::<R>))
        .route(
            "/api/v1/quality/orders/:order_id/evaluate",
            post(evaluate_handler::<R>),
        )
        .route("/api/v1/quality/evaluations", post(batch_handler::<R>))
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct ViolationWindow {
    start: String,
    end: String,
}

/// Sanitized score summary returned from the evaluate endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreView {
    pub order_id: OrderId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manager_id: Option<ManagerId>,
    pub deal_score_pct: Option<u32>,
    pub script_score_pct: Option<u32>,
    pub total_score: Option<u32>,
}

impl From<&OrderScore> for ScoreView {
    fn from(score: &OrderScore) -> Self {
        Self {
            order_id: score.order_id,
            manager_id: score.manager_id,
            deal_score_pct: score.deal_score_pct,
            script_score_pct: score.script_score_pct,
            total_score: score.total_score,
        }
    }
}

pub(crate) async fn violations_handler<R>(
    State(service): State<Arc<QualityService<R>>>,
    Query(window): Query<ViolationWindow>,
) -> Response
where
    R: QualityRepository + 'static,
{
    let bounds = parse_window(&window);
    let (start, end) = match bounds {
        Ok(bounds) => bounds,
        Err(message) => {
            let payload = json!({ "error": message });
            return (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response();
        }
    };

    match service.detect_violations(start, end) {
        Ok(violations) => (StatusCode::OK, axum::Json(violations)).into_response(),
        Err(error) => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}

pub(crate) async fn evaluate_handler<R>(
    State(service): State<Arc<QualityService<R>>>,
    Path(order_id): Path<i64>,
) -> Response
where
    R: QualityRepository + 'static,
{
    match service.evaluate_order(OrderId(order_id)).await {
        Ok(score) => (StatusCode::OK, axum::Json(ScoreView::from(&score))).into_response(),
        Err(error) => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}

pub(crate) async fn batch_handler<R>(
    State(service): State<Arc<QualityService<R>>>,
    axum::Json(request): axum::Json<BatchRequest>,
) -> Response
where
    R: QualityRepository + 'static,
{
    match service.run_full_evaluation(request).await {
        Ok(outcome) => (StatusCode::OK, axum::Json(outcome)).into_response(),
        Err(error) => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}

fn parse_window(window: &ViolationWindow) -> Result<(DateTime<Utc>, DateTime<Utc>), String> {
    let start = DateTime::parse_from_rfc3339(&window.start)
        .map_err(|_| format!("invalid start timestamp '{}'", window.start))?
        .with_timezone(&Utc);
    let end = DateTime::parse_from_rfc3339(&window.end)
        .map_err(|_| format!("invalid end timestamp '{}'", window.end))?
        .with_timezone(&Utc);
    if start > end {
        return Err("start must not be after end".to_string());
    }
    Ok((start, end))
}
